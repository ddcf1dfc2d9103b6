//! Manifest format tests
//!
//! Round trips, line folding at the 72-byte boundary, duplicate handling
//! and section lookup, exercised through the public manifest API.

use jar_verify::manifest::{
    AttributeName, Attributes, FormatErrorKind, Manifest, ManifestError, ManifestParser,
    ParseWarning, LINE_WIDTH,
};

fn parse(bytes: &[u8]) -> Manifest {
    Manifest::from_bytes(bytes).unwrap()
}

fn physical_lines(bytes: &[u8]) -> Vec<&[u8]> {
    bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

fn sample_manifest() -> Manifest {
    let mut manifest = Manifest::new();
    let main = manifest.main_attributes_mut();
    main.insert(AttributeName::CREATED_BY, "tests");
    main.insert(AttributeName::MAIN_CLASS, "com.example.Main");
    main.insert(AttributeName::MANIFEST_VERSION, "1.0");
    main.put_value("Implementation-Title", "example").unwrap();

    manifest
        .attributes_mut("com/example/Main.class")
        .insert(AttributeName::SHA_256_DIGEST, "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    manifest
        .attributes_mut("com/example/")
        .insert(AttributeName::SEALED, "true");
    manifest
}

// =============================================================================
// Round trip
// =============================================================================

/// Test 1: parse(write(m)) == m, with the version attribute written first
#[test]
fn test_round_trip_preserves_order() {
    let manifest = sample_manifest();
    let bytes = manifest.to_bytes();
    assert!(bytes.starts_with(b"Manifest-Version: 1.0\r\n"));

    let parsed = parse(&bytes);
    let names: Vec<&str> = parsed.main_attributes().names().map(|n| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["Manifest-Version", "Created-By", "Main-Class", "Implementation-Title"]
    );
    let entry_names: Vec<&String> = parsed.entries().keys().collect();
    assert_eq!(entry_names, vec!["com/example/Main.class", "com/example/"]);
    assert_eq!(
        parsed.attributes("com/example/").unwrap().get(&AttributeName::SEALED),
        Some("true")
    );
}

/// Test 2: Signature-Version leads a signature file's main section
#[test]
fn test_signature_version_written_first() {
    let mut manifest = Manifest::new();
    manifest.main_attributes_mut().insert(AttributeName::CREATED_BY, "tests");
    manifest
        .main_attributes_mut()
        .insert(AttributeName::SIGNATURE_VERSION, "1.0");
    assert!(manifest.to_bytes().starts_with(b"Signature-Version: 1.0\r\n"));
}

/// Test 3: write(parse(write(m))) is byte-identical to write(m)
#[test]
fn test_idempotence() {
    let once = sample_manifest().to_bytes();
    let twice = parse(&once).to_bytes();
    assert_eq!(once, twice);
    assert_eq!(parse(&twice), parse(&once));
}

// =============================================================================
// Line folding
// =============================================================================

/// Test 4: values of 71, 72 and 145 bytes fold and unfold exactly
#[test]
fn test_wrapping_boundaries() {
    for length in [71usize, 72, 145] {
        let value: String = (0..length)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let mut manifest = Manifest::new();
        manifest.main_attributes_mut().insert(AttributeName::MANIFEST_VERSION, "1.0");
        manifest.main_attributes_mut().put_value("X-Long", value.as_str()).unwrap();

        let bytes = manifest.to_bytes();
        for line in physical_lines(&bytes) {
            assert!(line.len() <= LINE_WIDTH, "{} byte line for length {}", line.len(), length);
        }
        let parsed = parse(&bytes);
        assert_eq!(parsed.main_attributes().get_value("X-Long"), Some(value.as_str()));
    }
}

/// Test 5: the 72-byte limit counts bytes, not characters
#[test]
fn test_wrapping_multibyte_value() {
    let value = "\u{00e9}".repeat(80);
    let mut manifest = Manifest::new();
    manifest.main_attributes_mut().insert(AttributeName::MANIFEST_VERSION, "1.0");
    manifest.main_attributes_mut().put_value("X-Accents", value.as_str()).unwrap();

    let bytes = manifest.to_bytes();
    assert!(physical_lines(&bytes).iter().all(|l| l.len() <= LINE_WIDTH));
    assert_eq!(
        parse(&bytes).main_attributes().get_value("X-Accents"),
        Some(value.as_str())
    );
}

/// Test 6: long entry names fold in the Name header too
#[test]
fn test_long_entry_name() {
    let name = format!("{}/Deep.class", "very/long/package/path".repeat(6));
    let mut manifest = Manifest::new();
    manifest.main_attributes_mut().insert(AttributeName::MANIFEST_VERSION, "1.0");
    manifest
        .attributes_mut(&name)
        .insert(AttributeName::SHA1_DIGEST, "2jmj7l5rSw0yVb/vlWAYkK/YBwk=");

    let bytes = manifest.to_bytes();
    assert!(physical_lines(&bytes).iter().all(|l| l.len() <= LINE_WIDTH));
    assert!(parse(&bytes).attributes(&name).is_some());
}

// =============================================================================
// Parsing rules
// =============================================================================

/// Test 7: duplicate names keep the last value and warn once
#[test]
fn test_duplicate_name_warns_once() {
    let raw = b"Manifest-Version: 1.0\r\nKey: a\r\nOther: x\r\nKey: b\r\n\r\n";
    let mut parser = ManifestParser::new();
    let manifest = parser.parse(&raw[..]).unwrap();

    assert_eq!(manifest.main_attributes().get_value("Key"), Some("b"));
    assert_eq!(parser.warnings().len(), 1);
    assert!(matches!(
        &parser.warnings()[0],
        ParseWarning::DuplicateName { name, section: None, .. } if name == "Key"
    ));
}

/// Test 8: names differing only in case are one attribute
#[test]
fn test_case_insensitive_duplicates() {
    let raw = b"Manifest-Version: 1.0\r\nmain-class: a.A\r\nMAIN-CLASS: b.B\r\n\r\n";
    let mut parser = ManifestParser::new();
    let manifest = parser.parse(&raw[..]).unwrap();
    assert_eq!(manifest.main_attributes().len(), 2);
    assert_eq!(
        manifest.main_attributes().get(&AttributeName::MAIN_CLASS),
        Some("b.B")
    );
    assert_eq!(parser.take_warnings().len(), 1);
    assert!(parser.warnings().is_empty());
}

/// Test 9: bare newlines and a missing final blank line are accepted
#[test]
fn test_lenient_line_endings() {
    let manifest = parse(b"Manifest-Version: 1.0\nCreated-By: x\n\nName: a\nK: v\n");
    assert_eq!(manifest.main_attributes().len(), 2);
    assert_eq!(manifest.attributes("a").unwrap().get_value("K"), Some("v"));
}

/// Test 10: a header without ": " fails with its position
#[test]
fn test_missing_colon_space_is_fatal() {
    let raw = b"Manifest-Version: 1.0\r\nBroken:value\r\n\r\n";
    let err = ManifestParser::with_file_name("app.jar")
        .parse(&raw[..])
        .unwrap_err();
    assert_eq!(err.format_kind(), Some(&FormatErrorKind::InvalidHeaderField));
    assert_eq!(err.position().map(|p| p.line), Some(2));
    assert!(err.to_string().contains("app.jar"));
}

/// Test 11: an invalid attribute name is a format error
#[test]
fn test_invalid_attribute_name() {
    let err = Manifest::from_bytes(b"Manifest-Version: 1.0\r\nBad Name: x\r\n\r\n").unwrap_err();
    assert!(matches!(
        err.format_kind(),
        Some(FormatErrorKind::InvalidName(_))
    ));
}

/// Test 12: lines over the buffer size are rejected
#[test]
fn test_line_too_long() {
    let mut raw = b"Manifest-Version: 1.0\r\nX-Long: ".to_vec();
    raw.extend(std::iter::repeat(b'x').take(600));
    raw.extend_from_slice(b"\r\n\r\n");
    let err = Manifest::from_bytes(&raw).unwrap_err();
    assert!(matches!(
        err,
        ManifestError::Format {
            kind: FormatErrorKind::LineTooLong,
            ..
        }
    ));
}

// =============================================================================
// Lookup
// =============================================================================

/// Test 13: present sections come back exactly, absent ones as None
#[test]
fn test_entry_lookup() {
    let manifest = parse(&sample_manifest().to_bytes());
    let mut expected = Attributes::new();
    expected.insert(
        AttributeName::SHA_256_DIGEST,
        "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=",
    );
    assert_eq!(manifest.attributes("com/example/Main.class"), Some(&expected));
    assert!(manifest.attributes("com/example/Missing.class").is_none());
    assert!(manifest.attributes("COM/EXAMPLE/MAIN.CLASS").is_none());
}

/// Test 14: repeated sections for one name merge
#[test]
fn test_repeated_sections_merge() {
    let manifest = parse(b"Manifest-Version: 1.0\r\n\r\nName: a\r\nK1: 1\r\n\r\nName: a\r\nK2: 2\r\n\r\n");
    assert_eq!(manifest.entries().len(), 1);
    let section = manifest.attributes("a").unwrap();
    assert_eq!(section.get_value("K1"), Some("1"));
    assert_eq!(section.get_value("K2"), Some("2"));
}
