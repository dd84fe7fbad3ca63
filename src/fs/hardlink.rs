use std::collections::HashMap;

use crate::hash::Hash;

/// maps (dev, ino) of store objects to their blob hash
///
/// checkouts that hardlink a blob into the working tree record its
/// inode here. when that file is committed again, the hash is reused
/// instead of re-reading the content.
#[derive(Debug, Default)]
pub struct DevInoCache {
    seen: HashMap<(u64, u64), Hash>,
}

impl DevInoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dev: u64, ino: u64, hash: Hash) {
        self.seen.insert((dev, ino), hash);
    }

    pub fn get(&self, dev: u64, ino: u64) -> Option<Hash> {
        self.seen.get(&(dev, ino)).copied()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = DevInoCache::new();
        let h = Hash::from_bytes([7u8; 32]);

        assert!(cache.get(1, 12345).is_none());
        cache.insert(1, 12345, h);
        assert_eq!(cache.get(1, 12345), Some(h));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_ino_different_dev() {
        let mut cache = DevInoCache::new();
        cache.insert(1, 12345, Hash::ZERO);

        assert!(cache.get(2, 12345).is_none());
    }

    #[test]
    fn test_empty() {
        let mut cache = DevInoCache::new();
        assert!(cache.is_empty());
        cache.insert(1, 1, Hash::ZERO);
        assert!(!cache.is_empty());
    }
}
