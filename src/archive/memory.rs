use std::io::{self, Read};

use indexmap::IndexMap;

use super::{ArchiveSource, EntryMetadata};

/// Archive held in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    name: String,
    entries: IndexMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert_file(name, bytes);
        self
    }

    pub fn with_directory(mut self, name: impl Into<String>) -> Self {
        self.insert_directory(name);
        self
    }

    /// Add or replace a file, keeping its position if it existed.
    pub fn insert_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    pub fn insert_directory(&mut self, name: impl Into<String>) {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        self.entries.insert(name, Vec::new());
    }

    /// Insert `name` at `index`, moving it there if it already exists.
    pub fn insert_file_at(&mut self, index: usize, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        self.entries.shift_remove(&name);
        let index = index.min(self.entries.len());
        self.entries.shift_insert(index, name, bytes);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<u8>> {
        self.entries.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl ArchiveSource for MemoryArchive {
    fn archive_name(&self) -> &str {
        &self.name
    }

    fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn metadata(&self, name: &str) -> Option<EntryMetadata> {
        self.entries.get(name).map(|bytes| EntryMetadata {
            size: bytes.len() as u64,
            is_directory: name.ends_with('/'),
        })
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        match self.entries.get(name) {
            Some(bytes) => Ok(Box::new(bytes.as_slice())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no entry {}", self.name, name),
            )),
        }
    }
}
