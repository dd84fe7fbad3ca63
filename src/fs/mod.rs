pub mod hardlink;
pub mod mtime;
pub mod read;
pub mod write;

pub use hardlink::DevInoCache;
pub use mtime::{set_sentinel_mtime, zero_mtime, SENTINEL_MTIME};
pub use read::{read_symlink_target, FileMetadata, FileType};
pub use write::{apply_metadata, create_symlink, fsync_dir, fsync_file, remove_existing};
