/// path-level difference between two trees
///
/// paths are relative to the compared root and `/`-separated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// added followed by modified paths
    pub fn changed_paths(&self) -> Vec<String> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn sort(&mut self) {
        self.added.sort();
        self.modified.sort();
        self.removed.sort();
    }
}

impl std::fmt::Display for DiffResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for path in &self.added {
            writeln!(f, "A {}", path)?;
        }
        for path in &self.modified {
            writeln!(f, "M {}", path)?;
        }
        for path in &self.removed {
            writeln!(f, "D {}", path)?;
        }
        Ok(())
    }
}
