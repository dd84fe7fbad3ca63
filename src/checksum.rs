//! stage fingerprint accumulator
//!
//! every value fed in is framed so that different sequences of typed
//! values never produce the same byte stream:
//!
//! | value          | encoding                                  |
//! |----------------|-------------------------------------------|
//! | string         | bytes followed by `0x00`                  |
//! | absent string  | `0x01`                                    |
//! | string list    | `0x01`, then each element as a string     |
//! | absent list    | `0x02`                                    |
//! | bool           | `0x01` / `0x00`                           |
//! | u32            | 4 bytes little-endian                     |
//! | raw data       | as-is, no framing                         |
//!
//! fingerprints are cumulative: the same accumulator is fed for every
//! stage of a pipeline and [`Checksum::current`] only snapshots it.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{IoResultExt, Result};

/// running SHA-256 over a stage's typed inputs
#[derive(Clone, Default)]
pub struct Checksum {
    hasher: Sha256,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// hex digest of everything fed so far, without consuming the state
    pub fn current(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn add_str(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.hasher.update(s.as_bytes());
                self.hasher.update([0u8]);
            }
            None => self.hasher.update([1u8]),
        }
    }

    pub fn add_strv<S: AsRef<str>>(&mut self, values: Option<&[S]>) {
        match values {
            Some(list) => {
                self.hasher.update([1u8]);
                for s in list {
                    self.add_str(Some(s.as_ref()));
                }
            }
            None => self.hasher.update([2u8]),
        }
    }

    pub fn add_bool(&mut self, value: bool) {
        self.hasher.update([value as u8]);
    }

    pub fn add_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// raw bytes, no framing
    pub fn add_data(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// path bytes, framed like a string
    pub fn add_path(&mut self, path: Option<&Path>) {
        match path {
            Some(p) => {
                self.hasher.update(p.as_os_str().as_bytes());
                self.hasher.update([0u8]);
            }
            None => self.hasher.update([1u8]),
        }
    }

    /// file contents, prefixed with their u64 length; a missing file hashes
    /// like an absent string
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        match fs::read(path) {
            Ok(data) => {
                self.hasher.update((data.len() as u64).to_le_bytes());
                self.add_data(&data);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.add_str(None);
                Ok(())
            }
            Err(e) => Err(e).with_path(path),
        }
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checksum")
            .field("current", &self.current())
            .finish()
    }
}
