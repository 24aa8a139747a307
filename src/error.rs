//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::feature::FeatureMode;

/// Convenient result type used throughout the crate.
pub type Result<T, E = FeatureError> = std::result::Result<T, E>;

/// Domain-specific error describing failures while parsing, encoding, or decoding features.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Index text is not a valid non-negative 32-bit integer.
    #[error("invalid feature index {text:?} in token {token:?}: expected a non-negative integer")]
    MalformedIndex {
        /// Full token being parsed.
        token: String,
        /// The offending index text.
        text: String,
    },
    /// Value text is not a valid finite double.
    #[error("invalid feature value {text:?} in token {token:?}: expected a finite number")]
    MalformedValue {
        /// Full token being parsed.
        token: String,
        /// The offending value text.
        text: String,
    },
    /// A named feature token carried an empty name.
    #[error("empty feature name in token {token:?}")]
    EmptyName {
        /// Full token being parsed.
        token: String,
    },
    /// Three-part `field:id:value` token encountered in indexed mode.
    #[error("field syntax is unsupported for indexed features: {token:?}")]
    UnsupportedFieldSyntax {
        /// Full token being parsed.
        token: String,
    },
    /// A binary read required more bytes than remain in the buffer.
    #[error("decode underrun at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    DecodeUnderrun {
        /// Buffer offset at which the read was attempted.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes left in the buffer.
        remaining: usize,
    },
    /// A binary record decoded into a value that violates the feature invariants.
    #[error("corrupt feature record at offset {offset}: {reason}")]
    CorruptRecord {
        /// Buffer offset of the offending field.
        offset: usize,
        /// Description of the violation.
        reason: String,
    },
    /// A string is too long to be length-prefixed with a 4-byte signed integer.
    #[error("feature string of {len} bytes exceeds the maximum encodable length")]
    RecordTooLarge {
        /// Length of the offending string in bytes.
        len: usize,
    },
    /// Failure attributed to a token at a given row position.
    #[error("token #{position}: {source}")]
    Token {
        /// Zero-based position of the token within the row.
        position: usize,
        /// Underlying parse error.
        #[source]
        source: Box<FeatureError>,
    },
    /// Failure attributed to a line of text input.
    #[error("line {line}: {source}")]
    Line {
        /// One-based line number.
        line: usize,
        /// Underlying row error.
        #[source]
        source: Box<FeatureError>,
    },
    /// A text row is not valid UTF-8.
    #[error("text row is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// A feature has no token form that parses back to the same feature.
    #[error("feature {feature:?} in row {row} cannot be written as a text token")]
    Unrenderable {
        /// Zero-based index of the row holding the feature.
        row: u64,
        /// Debug rendering of the feature.
        feature: String,
    },
    /// A feature's variant does not match the mode of the stream it is written to.
    #[error("feature mode mismatch: expected {expected}, found {found}")]
    ModeMismatch {
        /// Mode required by the stream.
        expected: FeatureMode,
        /// Mode of the offending feature.
        found: FeatureMode,
    },
    /// Row file header is missing or malformed.
    #[error("invalid row file header: {0}")]
    InvalidHeader(String),
    /// Row file ended in the middle of a row frame.
    #[error("row file truncated inside row {row}")]
    Truncated {
        /// Zero-based index of the incomplete row.
        row: u64,
    },
    /// An arena slot beyond the next free slot was addressed.
    #[error("arena slot {slot} out of range (arena holds {len} slots)")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Current number of slots.
        len: usize,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FeatureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl FeatureError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Wraps the error with the row position of the token that caused it.
    #[must_use]
    pub fn at_token(self, position: usize) -> Self {
        Self::Token {
            position,
            source: Box::new(self),
        }
    }

    /// Wraps the error with the one-based text line it occurred on.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        Self::Line {
            line,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, stripping token and line context.
    #[must_use]
    pub fn root(&self) -> &FeatureError {
        match self {
            Self::Token { source, .. } | Self::Line { source, .. } => source.root(),
            other => other,
        }
    }
}
