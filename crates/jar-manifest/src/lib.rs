//! JAR manifest format.
//!
//! A manifest is a main section of `Name: value` attributes followed by
//! per-entry sections, each introduced by a `Name:` header and closed by a
//! blank line. Physical lines are at most 72 bytes; longer headers continue
//! on lines starting with one space. Signature files (`*.SF`) use the same
//! format.
//!
//! The parser is strict about structure (line length, header syntax,
//! continuation placement) and lenient about content: duplicate attributes
//! are reported as [`ParseWarning`]s and the later value wins.

pub mod attributes;
pub mod error;
pub mod manifest;
pub mod name;
pub mod parser;
pub mod probe;
pub mod reader;
pub mod writer;

pub use attributes::Attributes;
pub use error::{FormatErrorKind, ManifestError, Position};
pub use manifest::{Manifest, TrustPredicate, UntrustedEntry};
pub use name::{AttributeName, InvalidAttributeName, MAX_NAME_LENGTH};
pub use parser::{ManifestParser, ParseWarning};
pub use probe::{scan as scan_special_attributes, SpecialAttributes};
pub use reader::MAX_LINE_LENGTH;
pub use writer::LINE_WIDTH;

/// Path of the manifest inside an archive.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
