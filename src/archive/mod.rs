//! Archive container layer
//!
//! The verifier never parses a container format itself. It consumes an
//! [`ArchiveSource`] that can:
//! - enumerate entry names in directory order
//! - report an entry's size and whether it is a directory
//! - open an entry's bytes
//!
//! Two sources are provided: [`MemoryArchive`] for assembled-in-memory
//! archives and [`DirectoryArchive`] for exploded archives on disk.

mod directory;
mod memory;

pub use directory::DirectoryArchive;
pub use memory::MemoryArchive;

use std::io::{self, Read};

use crate::signature::Signers;

/// Size and kind of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    pub size: u64,
    pub is_directory: bool,
}

/// Source of entry names and bytes for one archive
pub trait ArchiveSource: Send + Sync {
    /// Name used in diagnostics, e.g. a path
    fn archive_name(&self) -> &str;

    /// Entry names in directory order. Directories end with `/`.
    fn names(&self) -> Vec<String>;

    fn metadata(&self, name: &str) -> Option<EntryMetadata>;

    /// Open the raw bytes of an entry
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send + '_>>;

    /// Read a whole entry into memory
    fn read_bytes(&self, name: &str) -> io::Result<Vec<u8>> {
        let capacity = self
            .metadata(name)
            .map_or(0, |m| usize::try_from(m.size).unwrap_or(0));
        let mut buf = Vec::with_capacity(capacity);
        self.open(name)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// An entry as seen through a [`JarFile`](crate::JarFile).
///
/// `real_name` is set when a multi-release lookup resolved `name` to a
/// versioned entry; bytes and signers come from the real name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntry {
    name: String,
    real_name: Option<String>,
    size: u64,
    is_directory: bool,
    signers: Option<Signers>,
}

impl JarEntry {
    pub fn new(name: impl Into<String>, metadata: EntryMetadata) -> Self {
        Self {
            name: name.into(),
            real_name: None,
            size: metadata.size,
            is_directory: metadata.is_directory,
            signers: None,
        }
    }

    pub(crate) fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        let real_name = real_name.into();
        if real_name != self.name {
            self.real_name = Some(real_name);
        }
        self
    }

    /// Name the caller asked for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the entry actually read
    pub fn real_name(&self) -> &str {
        self.real_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_versioned(&self) -> bool {
        self.real_name.is_some()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Signers, known only after the entry was read to the end
    pub fn signers(&self) -> Option<&Signers> {
        self.signers.as_ref()
    }

    pub(crate) fn set_signers(&mut self, signers: Option<Signers>) {
        self.signers = signers;
    }
}
