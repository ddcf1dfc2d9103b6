//! Error types for manifest parsing.

use std::fmt;
use std::io;

use crate::name::InvalidAttributeName;

/// Where in the input a problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Archive or file name the manifest came from, when known.
    pub file: Option<String>,
    /// 1-based physical line number.
    pub line: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "manifest of {}:{}", file, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// The kind of malformed input that stopped a parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatErrorKind {
    /// The line did not fit the line buffer or had no line terminator.
    #[error("line too long")]
    LineTooLong,

    /// The line has no `: ` separating name and value.
    #[error("invalid header field")]
    InvalidHeaderField,

    /// A continuation line with nothing to continue.
    #[error("misplaced continuation line")]
    MisplacedContinuation,

    /// An entry section did not start with `Name: `.
    #[error("invalid manifest format")]
    InvalidSectionHeader,

    #[error("invalid header field name: {0}")]
    InvalidName(InvalidAttributeName),
}

/// Errors from reading or building a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{kind} ({position})")]
    Format {
        kind: FormatErrorKind,
        position: Position,
    },

    #[error("invalid attribute name: {0}")]
    InvalidName(#[from] InvalidAttributeName),
}

impl ManifestError {
    /// Position of a format error, if this is one.
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Format { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Kind of a format error, if this is one.
    pub fn format_kind(&self) -> Option<&FormatErrorKind> {
        match self {
            Self::Format { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
