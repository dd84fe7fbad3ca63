use std::path::Path;

/// read-only view of the build the cache serves
pub trait BuildContext {
    /// where the object store lives
    fn cache_dir(&self) -> &Path;

    /// true when checkouts sit under a copy-on-write overlay, which makes
    /// hardlinking store objects into the working tree safe
    fn overlay_active(&self) -> bool;

    /// re-checkout each stage's delta commit so the working tree shares
    /// storage with the cache
    fn use_hardlink_checkout(&self) -> bool;
}

impl<T: BuildContext + ?Sized> BuildContext for &T {
    fn cache_dir(&self) -> &Path {
        (**self).cache_dir()
    }

    fn overlay_active(&self) -> bool {
        (**self).overlay_active()
    }

    fn use_hardlink_checkout(&self) -> bool {
        (**self).use_hardlink_checkout()
    }
}
