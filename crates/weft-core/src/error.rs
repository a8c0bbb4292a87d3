//! Error types for glyph-stream loading and reconstruction.

use thiserror::Error;

/// Errors surfaced while reading the intermediate glyph stream.
///
/// Malformed input fails the whole page: the partially built tree is dropped
/// before the error reaches the caller. Recoverable geometric trouble
/// (degenerate matrices, unusable table rects) never surfaces here; it is
/// logged and skipped locally.
#[derive(Debug, Error)]
pub enum WeftError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level XML error from the pull parser.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Structurally invalid intermediate stream: unexpected tag, missing
    /// required attribute or non-numeric attribute value. `offset` is the
    /// byte position of the offending element.
    #[error("malformed input at byte {offset}: {message}")]
    Input {
        /// Byte offset of the offending element in the stream.
        offset: u64,
        /// What was wrong.
        message: String,
    },
}

impl WeftError {
    pub(crate) fn input(offset: u64, message: impl Into<String>) -> Self {
        Self::Input {
            offset,
            message: message.into(),
        }
    }
}

/// Result alias used throughout `weft-core`.
pub type Result<T> = std::result::Result<T, WeftError>;
