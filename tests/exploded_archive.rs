//! Exploded archive tests
//!
//! Sign a directory tree on disk, reopen it and verify every entry.

use std::fs;
use std::path::Path;

use jar_verify::signature::{generate_keypair, is_top_level_meta_inf};
use jar_verify::{
    ArchiveSource, DigestAlgorithm, DirectoryArchive, JarFile, JarSigner, SignerStatus,
    TrustViolation, VerifierConfig, MANIFEST_NAME,
};
use tempfile::TempDir;

/// Create a small application tree
fn create_tree(root: &Path) {
    fs::create_dir_all(root.join("com/example/util")).unwrap();
    fs::create_dir_all(root.join("META-INF")).unwrap();
    fs::write(
        root.join("META-INF/MANIFEST.MF"),
        "Manifest-Version: 1.0\r\nMain-Class: com.example.App\r\n\r\n",
    )
    .unwrap();
    fs::write(root.join("com/example/App.class"), b"\xCA\xFE\xBA\xBEapp").unwrap();
    fs::write(root.join("com/example/util/Strings.class"), b"\xCA\xFE\xBA\xBEstr").unwrap();
    fs::write(root.join("com/example/empty.properties"), b"").unwrap();
}

fn sign(root: &Path, digest: DigestAlgorithm) {
    let mut archive = DirectoryArchive::open(root).unwrap();
    let files = JarSigner::new("release", generate_keypair())
        .unwrap()
        .with_digest(digest)
        .sign_directory(&mut archive)
        .unwrap();
    assert_eq!(files.digested, 3);
}

fn read_all(jar: &JarFile<DirectoryArchive>) -> Result<usize, jar_verify::JarError> {
    let mut signed = 0;
    for mut entry in jar.versioned_entries()? {
        if entry.is_directory() || is_top_level_meta_inf(entry.name()) {
            continue;
        }
        jar.read_entry(&mut entry)?;
        if entry.signers().is_some() {
            signed += 1;
        }
    }
    Ok(signed)
}

// =============================================================================
// Signing and verification on disk
// =============================================================================

/// Test 1: sign in place, reopen, every entry verifies
#[test]
fn test_sign_and_verify_directory() {
    let dir = TempDir::new().unwrap();
    create_tree(dir.path());
    sign(dir.path(), DigestAlgorithm::Sha256);

    assert!(dir.path().join("META-INF/RELEASE.SF").is_file());
    assert!(dir.path().join("META-INF/RELEASE.EC").is_file());

    let jar = JarFile::new(DirectoryArchive::open(dir.path()).unwrap());
    assert!(jar.is_signed().unwrap());
    let manifest = jar.manifest().unwrap().unwrap();
    assert_eq!(
        manifest.main_attributes().get_value("Main-Class"),
        Some("com.example.App")
    );
    assert_eq!(read_all(&jar).unwrap(), 3);
    assert!(matches!(
        jar.signer_status("com/example/empty.properties").unwrap(),
        SignerStatus::Verified(_)
    ));
}

/// Test 2: listing puts the manifest and signature files first
#[test]
fn test_listing_after_signing() {
    let dir = TempDir::new().unwrap();
    create_tree(dir.path());
    sign(dir.path(), DigestAlgorithm::Sha384);

    let archive = DirectoryArchive::open(dir.path()).unwrap();
    let names = archive.names();
    assert_eq!(names[0], "META-INF/");
    assert_eq!(names[1], MANIFEST_NAME);
    let meta: Vec<&String> = names[2..4].iter().collect();
    assert!(meta.contains(&&"META-INF/RELEASE.SF".to_string()));
    assert!(meta.contains(&&"META-INF/RELEASE.EC".to_string()));
}

/// Test 3: editing a file on disk after signing is detected
#[test]
fn test_modified_file_on_disk() {
    let dir = TempDir::new().unwrap();
    create_tree(dir.path());
    sign(dir.path(), DigestAlgorithm::Sha1);
    fs::write(dir.path().join("com/example/util/Strings.class"), b"patched").unwrap();

    let jar = JarFile::new(DirectoryArchive::open(dir.path()).unwrap());
    let err = read_all(&jar).unwrap_err();
    assert!(matches!(
        err.trust_violation(),
        Some(TrustViolation::DigestMismatch { name, algorithm })
            if name == "com/example/util/Strings.class" && algorithm == "SHA-1"
    ));
}

/// Test 4: with the only digest algorithm disabled, entries lose their
/// signers but the manifest stays signed
#[test]
fn test_disabled_digest_algorithm() {
    let dir = TempDir::new().unwrap();
    create_tree(dir.path());
    sign(dir.path(), DigestAlgorithm::Sha512);

    let config = VerifierConfig {
        disabled_digest_algorithms: vec!["SHA-512".to_string()],
        ..VerifierConfig::default()
    };
    let jar = JarFile::with_config(DirectoryArchive::open(dir.path()).unwrap(), config);
    assert!(jar.is_signed().unwrap());
    assert_eq!(read_all(&jar).unwrap(), 0);
    assert_eq!(
        jar.signer_status("com/example/App.class").unwrap(),
        SignerStatus::NotSigned
    );
    assert!(jar.trusted_attributes("com/example/App.class").is_err());
}

/// Test 5: an unsigned tree reads plainly
#[test]
fn test_unsigned_directory() {
    let dir = TempDir::new().unwrap();
    create_tree(dir.path());

    let jar = JarFile::new(DirectoryArchive::open(dir.path()).unwrap());
    assert!(!jar.is_signed().unwrap());
    assert_eq!(read_all(&jar).unwrap(), 0);
    assert!(!jar.has_class_path_attribute().unwrap());
}

/// Test 6: config loaded from disk drives verification
#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("jarverify.toml");
    fs::write(
        &config_path,
        "verify = false\nrelease = 11\nmulti_release = \"disabled\"\n",
    )
    .unwrap();
    let config = VerifierConfig::from_file(&config_path).unwrap();

    let tree = dir.path().join("app");
    create_tree(&tree);
    sign(&tree, DigestAlgorithm::Sha256);
    fs::write(tree.join("com/example/App.class"), b"patched").unwrap();

    let jar = JarFile::with_config(DirectoryArchive::open(&tree).unwrap(), config);
    assert!(!jar.is_multi_release().unwrap());
    assert_eq!(read_all(&jar).unwrap(), 0);
}
