mod commit;
mod diff;
mod tree;

pub use commit::Commit;
pub use diff::DiffResult;
pub use tree::{EntryKind, Tree, TreeEntry};
