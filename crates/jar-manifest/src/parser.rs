//! Manifest parsing.

use std::fmt;
use std::io::Read;

use serde::Serialize;

use crate::attributes::Attributes;
use crate::error::{FormatErrorKind, ManifestError, Position};
use crate::manifest::Manifest;
use crate::reader::{strip_terminator, LineReader, MAX_LINE_LENGTH};

const NAME_HEADER: &[u8] = b"Name: ";

/// A non-fatal problem noticed while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// The same attribute appeared twice in one section; the later value won.
    DuplicateName {
        name: String,
        /// Entry name, or `None` for the main section.
        section: Option<String>,
        #[serde(serialize_with = "serialize_position")]
        position: Position,
    },
}

fn serialize_position<S: serde::Serializer>(p: &Position, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(p)
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName {
                name,
                section: Some(section),
                position,
            } => write!(f, "duplicate attribute '{name}' in entry '{section}' ({position})"),
            Self::DuplicateName {
                name, position, ..
            } => write!(f, "duplicate attribute '{name}' in main section ({position})"),
        }
    }
}

/// Running state shared by the section readers.
#[derive(Debug)]
pub(crate) struct ParseContext {
    pub(crate) file: Option<String>,
    pub(crate) line: usize,
    pub(crate) section: Option<String>,
    pub(crate) warnings: Vec<ParseWarning>,
}

impl ParseContext {
    pub(crate) fn new(file: Option<String>) -> Self {
        Self {
            file,
            line: 0,
            section: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn position(&self) -> Position {
        Position {
            file: self.file.clone(),
            line: self.line,
        }
    }

    pub(crate) fn error(&self, kind: FormatErrorKind) -> ManifestError {
        ManifestError::Format {
            kind,
            position: self.position(),
        }
    }
}

/// Parses manifests and keeps the warnings of every parse it ran.
#[derive(Debug, Default)]
pub struct ManifestParser {
    file: Option<String>,
    warnings: Vec<ParseWarning>,
}

impl ManifestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in error positions, usually the archive path.
    pub fn with_file_name(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<ParseWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Parse a complete manifest: the main section, then entry sections
    /// introduced by `Name:` headers. Repeated entry names merge into one map.
    pub fn parse<R: Read>(&mut self, input: R) -> Result<Manifest, ManifestError> {
        let mut reader = LineReader::new(input);
        let mut ctx = ParseContext::new(self.file.clone());
        let mut manifest = Manifest::new();

        manifest.main_attributes_mut().read_section(&mut reader, &mut ctx)?;

        let mut entry_count = 0usize;
        let mut attribute_count = 0usize;
        let mut capacity = 2usize;
        let mut line = Vec::with_capacity(MAX_LINE_LENGTH);

        loop {
            if reader.read_line(&mut line, MAX_LINE_LENGTH)? == 0 {
                break;
            }
            ctx.line += 1;
            let content =
                strip_terminator(&line).ok_or_else(|| ctx.error(FormatErrorKind::LineTooLong))?;
            if content.is_empty() {
                continue;
            }

            let mut name = parse_name_header(content)
                .ok_or_else(|| ctx.error(FormatErrorKind::InvalidSectionHeader))?
                .to_vec();
            while reader.peek()? == Some(b' ') {
                reader.read_line(&mut line, MAX_LINE_LENGTH)?;
                ctx.line += 1;
                let content = strip_terminator(&line)
                    .ok_or_else(|| ctx.error(FormatErrorKind::LineTooLong))?;
                name.extend_from_slice(&content[1..]);
            }
            let name = String::from_utf8_lossy(&name).into_owned();
            ctx.section = Some(name.clone());

            let attributes = manifest
                .entries_mut()
                .entry(name)
                .or_insert_with(|| Attributes::with_capacity(capacity));
            attributes.read_section(&mut reader, &mut ctx)?;

            entry_count += 1;
            attribute_count += attributes.len();
            capacity = (attribute_count / entry_count).max(2);
        }

        log::trace!(
            "parsed manifest with {} entries and {} warnings",
            manifest.entries().len(),
            ctx.warnings.len()
        );
        self.warnings.extend(ctx.warnings);
        Ok(manifest)
    }
}

/// Value of a `Name: ` header line, matching the label without regard to case.
pub(crate) fn parse_name_header(line: &[u8]) -> Option<&[u8]> {
    let label = line.get(..NAME_HEADER.len())?;
    label
        .eq_ignore_ascii_case(NAME_HEADER)
        .then_some(&line[NAME_HEADER.len()..])
}
