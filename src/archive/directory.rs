//! Exploded archive on disk.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use super::{ArchiveSource, EntryMetadata};
use crate::signature::{is_top_level_meta_inf, META_INF};
use jar_manifest::MANIFEST_NAME;

#[derive(Debug, Clone)]
struct DiskEntry {
    path: PathBuf,
    metadata: EntryMetadata,
}

/// A directory tree read as an archive.
///
/// Entries are listed the way archive tools write them: `META-INF/` first,
/// then the manifest, then other top-level `META-INF` files, then the rest
/// in path order. The listing is taken once, at [`open`](Self::open).
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
    name: String,
    entries: IndexMap<String, DiskEntry>,
}

/// Sort rank of an entry name
fn rank(name: &str) -> u8 {
    if name.eq_ignore_ascii_case(META_INF) {
        0
    } else if name.eq_ignore_ascii_case(MANIFEST_NAME) {
        1
    } else if is_top_level_meta_inf(name) {
        2
    } else {
        3
    }
}

fn entry_order(a: &str, b: &str) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

impl DirectoryArchive {
    /// List the tree under `root`.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut listed = Vec::new();

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            let Ok(rel_path) = entry.path().strip_prefix(&root) else {
                continue;
            };
            if rel_path.as_os_str().is_empty() {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                log::debug!("{}: skipping symlink", entry.path().display());
                continue;
            }

            let mut name = rel_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let metadata = if file_type.is_dir() {
                name.push('/');
                EntryMetadata {
                    size: 0,
                    is_directory: true,
                }
            } else {
                EntryMetadata {
                    size: entry.metadata().map_err(io::Error::from)?.len(),
                    is_directory: false,
                }
            };

            listed.push((
                name,
                DiskEntry {
                    path: entry.path().to_path_buf(),
                    metadata,
                },
            ));
        }

        listed.sort_by(|(a, _), (b, _)| entry_order(a, b));
        log::debug!("{}: {} entries", root.display(), listed.len());

        Ok(Self {
            name: root.display().to_string(),
            root,
            entries: listed.into_iter().collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path on disk for an entry name
    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(|e| e.path.as_path())
    }

    /// Write `bytes` to the entry `name`, creating parent directories, and
    /// list it.
    pub fn write_entry(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = name
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;

        self.entries.insert(
            name.to_string(),
            DiskEntry {
                path,
                metadata: EntryMetadata {
                    size: bytes.len() as u64,
                    is_directory: false,
                },
            },
        );
        self.entries.sort_by(|a, _, b, _| entry_order(a, b));
        Ok(())
    }
}

impl ArchiveSource for DirectoryArchive {
    fn archive_name(&self) -> &str {
        &self.name
    }

    fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn metadata(&self, name: &str) -> Option<EntryMetadata> {
        self.entries.get(name).map(|e| e.metadata)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        let entry = self.entries.get(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no entry {}", self.name, name),
            )
        })?;
        if entry.metadata.is_directory {
            return Ok(Box::new(io::empty()));
        }
        Ok(Box::new(File::open(&entry.path)?))
    }
}
