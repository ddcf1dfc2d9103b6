//! Archive handle: manifest access, versioned lookup and verified reads.
//!
//! A [`JarFile`] owns an [`ArchiveSource`] and the per-archive verifier.
//! State is built lazily and at most once:
//! - the raw manifest bytes and the parsed [`Manifest`]
//! - the special-attribute probe (multi-release, class path)
//! - the verifier, which is either active or dropped when nothing is signed
//!
//! Entry streams borrow the handle, so any number of them can be read
//! concurrently from different threads.

use std::collections::HashSet;
use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use jar_manifest::{
    scan_special_attributes, Attributes, Manifest, ManifestParser, SpecialAttributes,
    MANIFEST_NAME,
};
use once_cell::sync::OnceCell;

use crate::archive::{ArchiveSource, JarEntry};
use crate::config::{MultiReleaseMode, VerifierConfig, BASE_RELEASE};
use crate::error::{JarError, JarResult, SignatureError};
use crate::signature::{is_block_or_sf, is_top_level_meta_inf, Signers, META_INF};
use crate::verifier::{lock_verifier, JarVerifier, VerifyingEntryStream};

/// Directory holding versioned entries
pub const VERSIONS_DIR: &str = "META-INF/versions/";

/// What is known about an entry's signers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerStatus {
    /// The archive carries no usable signature
    Unsigned,
    /// The archive is signed but no signer covers this entry
    NotSigned,
    /// Signers vouch for the manifest section; the bytes were not read yet
    Claimed(Signers),
    /// The entry's bytes were read and matched
    Verified(Signers),
}

/// Stream over one entry's bytes
pub enum EntryStream<'a> {
    Plain(Box<dyn Read + Send + 'a>),
    Verifying(VerifyingEntryStream<'a, Box<dyn Read + Send + 'a>>),
}

impl EntryStream<'_> {
    /// Signers established by a complete verified read
    pub fn signers(&self) -> Option<&Signers> {
        match self {
            EntryStream::Plain(_) => None,
            EntryStream::Verifying(stream) => stream.signers(),
        }
    }

    /// Close the stream, surfacing a trust violation not yet returned.
    pub fn close(self) -> io::Result<()> {
        match self {
            EntryStream::Plain(_) => Ok(()),
            EntryStream::Verifying(stream) => stream.close(),
        }
    }
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryStream::Plain(inner) => inner.read(buf),
            EntryStream::Verifying(stream) => stream.read(buf),
        }
    }
}

/// An opened archive
pub struct JarFile<A> {
    archive: A,
    config: VerifierConfig,
    manifest_bytes: OnceCell<Option<Vec<u8>>>,
    manifest: OnceCell<Option<Arc<Manifest>>>,
    special: OnceCell<SpecialAttributes>,
    /// `None` once initialised means the archive is treated as unsigned.
    verifier: OnceCell<Option<Mutex<JarVerifier>>>,
    /// Versions present under `META-INF/versions/`, highest first
    versions: OnceCell<Vec<u32>>,
}

impl<A: fmt::Debug> fmt::Debug for JarFile<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JarFile")
            .field("archive", &self.archive)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<A: ArchiveSource> JarFile<A> {
    pub fn new(archive: A) -> Self {
        Self::with_config(archive, VerifierConfig::default())
    }

    pub fn with_config(archive: A, config: VerifierConfig) -> Self {
        Self {
            archive,
            config,
            manifest_bytes: OnceCell::new(),
            manifest: OnceCell::new(),
            special: OnceCell::new(),
            verifier: OnceCell::new(),
            versions: OnceCell::new(),
        }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn into_archive(self) -> A {
        self.archive
    }

    /// Name of the manifest entry: exact match first, then any case.
    pub fn manifest_entry_name(&self) -> Option<String> {
        if self.archive.metadata(MANIFEST_NAME).is_some() {
            return Some(MANIFEST_NAME.to_string());
        }
        self.archive
            .names()
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(MANIFEST_NAME))
    }

    fn manifest_bytes(&self) -> JarResult<Option<&[u8]>> {
        let bytes = self.manifest_bytes.get_or_try_init(|| -> JarResult<_> {
            match self.manifest_entry_name() {
                Some(name) => Ok(Some(self.archive.read_bytes(&name)?)),
                None => Ok(None),
            }
        })?;
        Ok(bytes.as_deref())
    }

    /// The parsed manifest, or `None` when the archive has none
    pub fn manifest(&self) -> JarResult<Option<Arc<Manifest>>> {
        let manifest = self.manifest.get_or_try_init(|| -> JarResult<_> {
            let Some(raw) = self.manifest_bytes()? else {
                return Ok(None);
            };
            let mut parser = ManifestParser::with_file_name(self.archive.archive_name());
            let manifest = parser.parse(raw)?;
            Ok(Some(Arc::new(manifest)))
        })?;
        Ok(manifest.clone())
    }

    fn special_attributes(&self) -> JarResult<SpecialAttributes> {
        let special = self.special.get_or_try_init(|| -> JarResult<_> {
            Ok(self
                .manifest_bytes()?
                .map(scan_special_attributes)
                .unwrap_or_default())
        })?;
        Ok(*special)
    }

    /// Whether the manifest declares a `Class-Path`
    pub fn has_class_path_attribute(&self) -> JarResult<bool> {
        Ok(self.special_attributes()?.has_class_path)
    }

    /// Whether versioned entries are resolved for this archive
    pub fn is_multi_release(&self) -> JarResult<bool> {
        if self.config.release <= BASE_RELEASE {
            return Ok(false);
        }
        Ok(match self.config.multi_release {
            MultiReleaseMode::Disabled => false,
            MultiReleaseMode::Forced => true,
            MultiReleaseMode::Auto => self.special_attributes()?.multi_release,
        })
    }

    /// Build the verifier if that has not happened yet.
    ///
    /// Unreadable or oversized signature files make the archive unsigned.
    /// A trust violation while processing signature files is returned and
    /// initialisation is retried on the next call.
    pub fn ensure_initialization(&self) -> JarResult<()> {
        self.verifier.get_or_try_init(|| self.init_verifier())?;
        Ok(())
    }

    fn active_verifier(&self) -> JarResult<Option<&Mutex<JarVerifier>>> {
        self.ensure_initialization()?;
        Ok(self.verifier.get().and_then(Option::as_ref))
    }

    /// Whether the archive has at least one resolved signer
    pub fn is_signed(&self) -> JarResult<bool> {
        Ok(self.active_verifier()?.is_some())
    }

    fn init_verifier(&self) -> JarResult<Option<Mutex<JarVerifier>>> {
        if !self.config.verify {
            return Ok(None);
        }
        let Some(manifest) = self.manifest()? else {
            return Ok(None);
        };
        let raw = self.manifest_bytes()?.unwrap_or_default().to_vec();

        let meta_names: Vec<String> = self
            .archive
            .names()
            .into_iter()
            .filter(|name| {
                is_top_level_meta_inf(name)
                    && (name.eq_ignore_ascii_case(MANIFEST_NAME) || is_block_or_sf(name))
            })
            .collect();
        if !meta_names.iter().any(|name| is_block_or_sf(name)) {
            return Ok(None);
        }

        let mut verifier = JarVerifier::new(manifest, raw, &self.config);
        for name in &meta_names {
            match self.ingest(&mut verifier, name) {
                Ok(()) => {}
                Err(err @ JarError::Trust(_)) => return Err(err),
                Err(err) => {
                    log::debug!(
                        "{}: treating archive as unsigned: {}",
                        self.archive.archive_name(),
                        err
                    );
                    return Ok(None);
                }
            }
        }
        verifier.done_with_meta();

        if verifier.nothing_to_verify() {
            log::debug!("{}: no resolved signers", self.archive.archive_name());
            return Ok(None);
        }
        Ok(Some(Mutex::new(verifier)))
    }

    fn ingest(&self, verifier: &mut JarVerifier, name: &str) -> JarResult<()> {
        let size = self.archive.metadata(name).map_or(0, |m| m.size);
        if is_block_or_sf(name) && size > self.config.max_signature_file_size {
            let err = SignatureError::TooLarge {
                name: name.to_string(),
                size,
                limit: self.config.max_signature_file_size,
            };
            return Err(io::Error::new(io::ErrorKind::InvalidData, err).into());
        }
        let bytes = self.archive.read_bytes(name)?;

        let mut mev = verifier.entry_verifier();
        verifier.begin_entry(name, false, &mut mev);
        verifier.update(&bytes, &mut mev);
        verifier.end_entry(&mut mev)?;
        Ok(())
    }

    /// Attributes of `name`'s manifest section, provided every signer of
    /// the manifest also covers it.
    pub fn trusted_attributes(&self, name: &str) -> JarResult<Option<Attributes>> {
        let Some(manifest) = self.manifest()? else {
            return Ok(None);
        };
        match self.active_verifier()? {
            Some(verifier) => {
                let guard = lock_verifier(verifier);
                Ok(manifest.trusted_attributes(name, &*guard)?.cloned())
            }
            None => Ok(manifest.attributes(name).cloned()),
        }
    }

    fn versions(&self) -> &[u32] {
        self.versions.get_or_init(|| {
            let mut versions: Vec<u32> = self
                .archive
                .names()
                .iter()
                .filter_map(|name| {
                    let rest = name.strip_prefix(VERSIONS_DIR)?;
                    let (version, _) = rest.split_once('/')?;
                    version.parse().ok()
                })
                .filter(|v| *v > BASE_RELEASE && *v <= self.config.release)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            versions.sort_unstable_by(|a, b| b.cmp(a));
            versions
        })
    }

    /// Look up `name`, resolving it to the highest applicable versioned
    /// entry when the archive is multi-release.
    pub fn entry(&self, name: &str) -> JarResult<Option<JarEntry>> {
        if self.is_multi_release()? && !is_meta_inf(name) {
            for version in self.versions() {
                let real_name = format!("{}{}/{}", VERSIONS_DIR, version, name);
                if let Some(metadata) = self.archive.metadata(&real_name) {
                    return Ok(Some(JarEntry::new(name, metadata).with_real_name(real_name)));
                }
            }
        }
        Ok(self
            .archive
            .metadata(name)
            .map(|metadata| JarEntry::new(name, metadata)))
    }

    /// Every entry as listed, without versioned resolution
    pub fn entries(&self) -> Vec<JarEntry> {
        self.archive
            .names()
            .into_iter()
            .filter_map(|name| {
                let metadata = self.archive.metadata(&name)?;
                Some(JarEntry::new(name, metadata))
            })
            .collect()
    }

    /// Entries as a release-aware reader sees them: versioned entries are
    /// folded onto their base names and each name appears once.
    pub fn versioned_entries(&self) -> JarResult<Vec<JarEntry>> {
        if !self.is_multi_release()? {
            return Ok(self.entries());
        }
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for name in self.archive.names() {
            let Some(base) = self.base_name(&name) else {
                continue;
            };
            if !seen.insert(base.to_string()) {
                continue;
            }
            if let Some(entry) = self.entry(base)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Base name of a listed entry, or `None` for version directories,
    /// malformed versions and versions above the release.
    fn base_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        let Some(rest) = name.strip_prefix(VERSIONS_DIR) else {
            return Some(name);
        };
        let (version, base) = rest.split_once('/')?;
        if base.is_empty() {
            return None;
        }
        match version.parse::<u32>() {
            Ok(v) if v <= self.config.release => Some(base),
            _ => None,
        }
    }

    /// Open an entry. When the archive is signed the stream verifies the
    /// bytes as they are read.
    pub fn input_stream(&self, entry: &JarEntry) -> JarResult<EntryStream<'_>> {
        let verifier = self.active_verifier()?;
        let real_name = entry.real_name();
        let metadata = self
            .archive
            .metadata(real_name)
            .ok_or_else(|| JarError::EntryNotFound(real_name.to_string()))?;
        let inner = self.archive.open(real_name)?;

        Ok(match verifier {
            Some(verifier) => EntryStream::Verifying(VerifyingEntryStream::new(
                inner,
                real_name,
                metadata.size,
                metadata.is_directory,
                verifier,
            )),
            None => EntryStream::Plain(inner),
        })
    }

    /// Read a whole entry through [`input_stream`](Self::input_stream) and
    /// record its signers on `entry`.
    pub fn read_entry(&self, entry: &mut JarEntry) -> JarResult<Vec<u8>> {
        let mut stream = self.input_stream(entry)?;
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        stream
            .read_to_end(&mut bytes)
            .map_err(JarError::from_stream_error)?;
        entry.set_signers(stream.signers().cloned());
        stream.close().map_err(JarError::from_stream_error)?;
        Ok(bytes)
    }

    /// Current signer state of an entry, by real name
    pub fn signer_status(&self, name: &str) -> JarResult<SignerStatus> {
        let Some(verifier) = self.active_verifier()? else {
            return Ok(SignerStatus::Unsigned);
        };
        let guard = lock_verifier(verifier);
        if let Some(signers) = guard.verified_signers(name) {
            return Ok(SignerStatus::Verified(Arc::clone(signers)));
        }
        Ok(match guard.claimed_signers(name) {
            Some(signers) => SignerStatus::Claimed(Arc::clone(signers)),
            None => SignerStatus::NotSigned,
        })
    }

    /// Outcome of each signature block, empty for unsigned archives
    pub fn block_reports(&self) -> JarResult<Vec<crate::signature::BlockReport>> {
        Ok(match self.active_verifier()? {
            Some(verifier) => lock_verifier(verifier).block_reports().to_vec(),
            None => Vec::new(),
        })
    }
}

fn is_meta_inf(name: &str) -> bool {
    name.get(..META_INF.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(META_INF))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn archive(manifest: &str) -> MemoryArchive {
        MemoryArchive::new("test.jar")
            .with_directory("META-INF/")
            .with_file(MANIFEST_NAME, manifest.as_bytes().to_vec())
    }

    #[test]
    fn test_unsigned_archive_reads_plain() {
        let jar = JarFile::new(
            archive("Manifest-Version: 1.0\r\n\r\n").with_file("a.txt", b"hello".to_vec()),
        );
        let mut entry = jar.entry("a.txt").unwrap().unwrap();
        assert_eq!(jar.read_entry(&mut entry).unwrap(), b"hello");
        assert!(entry.signers().is_none());
        assert!(!jar.is_signed().unwrap());
        assert_eq!(jar.signer_status("a.txt").unwrap(), SignerStatus::Unsigned);
    }

    #[test]
    fn test_manifest_lookup_ignores_case() {
        let archive = MemoryArchive::new("test.jar")
            .with_file("meta-inf/manifest.mf", b"Manifest-Version: 1.0\r\nMain-Class: a.B\r\n\r\n".to_vec());
        let jar = JarFile::new(archive);
        assert_eq!(jar.manifest_entry_name().as_deref(), Some("meta-inf/manifest.mf"));
        let manifest = jar.manifest().unwrap().unwrap();
        assert_eq!(manifest.main_attributes().get_value("Main-Class"), Some("a.B"));
    }

    #[test]
    fn test_no_manifest() {
        let jar = JarFile::new(MemoryArchive::new("bare.jar").with_file("a", vec![1]));
        assert!(jar.manifest().unwrap().is_none());
        assert!(!jar.is_multi_release().unwrap());
        assert!(!jar.has_class_path_attribute().unwrap());
        assert!(jar.trusted_attributes("a").unwrap().is_none());
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        let jar = JarFile::new(archive("Manifest-Version 1.0\r\n\r\n"));
        assert!(matches!(jar.manifest(), Err(JarError::Manifest(_))));
    }

    #[test]
    fn test_special_attributes() {
        let jar = JarFile::new(archive(
            "Manifest-Version: 1.0\r\nClass-Path: lib/a.jar\r\nMulti-Release: true\r\n\r\n",
        ));
        assert!(jar.has_class_path_attribute().unwrap());
        assert!(jar.is_multi_release().unwrap());
    }

    #[test]
    fn test_multi_release_modes() {
        let manifest = "Manifest-Version: 1.0\r\n\r\n";
        let forced = VerifierConfig {
            multi_release: MultiReleaseMode::Forced,
            ..VerifierConfig::default()
        };
        assert!(JarFile::with_config(archive(manifest), forced.clone())
            .is_multi_release()
            .unwrap());

        let base = VerifierConfig {
            release: 8,
            ..forced
        };
        assert!(!JarFile::with_config(archive(manifest), base)
            .is_multi_release()
            .unwrap());
    }

    #[test]
    fn test_base_name() {
        let jar = JarFile::new(archive("Manifest-Version: 1.0\r\n\r\n"));
        assert_eq!(jar.base_name("a/B.class"), Some("a/B.class"));
        assert_eq!(jar.base_name("META-INF/versions/11/a/B.class"), Some("a/B.class"));
        assert_eq!(jar.base_name("META-INF/versions/11/"), None);
        assert_eq!(jar.base_name("META-INF/versions/"), None);
        assert_eq!(jar.base_name("META-INF/versions/x/a/B.class"), None);
        assert_eq!(jar.base_name("META-INF/versions/99/a/B.class"), None);
    }

    #[test]
    fn test_missing_entry() {
        let jar = JarFile::new(archive("Manifest-Version: 1.0\r\n\r\n"));
        assert!(jar.entry("nope").unwrap().is_none());

        let ghost = JarEntry::new(
            "ghost",
            crate::archive::EntryMetadata {
                size: 0,
                is_directory: false,
            },
        );
        assert!(matches!(
            jar.input_stream(&ghost),
            Err(JarError::EntryNotFound(_))
        ));
    }
}
