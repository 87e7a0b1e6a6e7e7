//! Error types for export operations
//!
//! Two layers: [`ConversionError`] aborts the whole run, [`RecordError`] only
//! skips the article that raised it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Location inside the input document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    /// Byte offset into the decoded document
    pub offset: usize,
}

impl TextPosition {
    /// Compute line and column for a byte offset in `text`
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }

        let prefix = &text[..offset];
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = prefix[line_start..].chars().count() + 1;

        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors that abort an export run
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Input file could not be read or output location could not be prepared
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Character encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Input is not well-formed XML
    #[error("XML parse error{}: {message}", at_position(.position))]
    StructuralParse {
        message: String,
        position: Option<TextPosition>,
    },

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn at_position(position: &Option<TextPosition>) -> String {
    position.map(|p| format!(" at {p}")).unwrap_or_default()
}

impl ConversionError {
    /// Process exit code for the CLI
    pub fn code(&self) -> i32 {
        match self {
            ConversionError::StructuralParse { .. } => 2,
            ConversionError::Encoding(_) => 3,
            ConversionError::InvalidInput(_) => 4,
            ConversionError::Io { .. } => 5,
        }
    }
}

/// Errors confined to a single article
#[derive(Error, Debug)]
pub enum RecordError {
    /// Body markup could not be converted
    #[error("body conversion failed: {0}")]
    Markup(String),

    /// An integer field holds something that is not an integer
    #[error("field `{field}` is not an integer: {value:?}")]
    Metadata { field: &'static str, value: String },

    /// Output file could not be written
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A [`RecordError`] tagged with the article it came from
#[derive(Debug)]
pub struct RecordFailure {
    /// 0-based position of the article in the document
    pub index: usize,
    /// Title, identifier, or `#<index>` when neither is available
    pub label: String,
    pub error: RecordError,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "article {} ({}): {}", self.index + 1, self.label, self.error)
    }
}
