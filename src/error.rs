//! Centralized error types for lurefill.

use std::path::PathBuf;
use thiserror::Error;

use crate::template::TemplateError;

/// All errors produced by the lurefill library.
#[derive(Error, Debug)]
pub enum LureError {
    /// The stored content is not valid base64.
    #[error("Attachment content is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The file has an office-document extension but is not a zip container.
    #[error("Not a valid archive container: {0}")]
    Container(#[source] zip::result::ZipError),

    /// A member of the source archive could not be read.
    #[error("Failed to read archive member '{name}': {source}")]
    Member {
        name: String,
        source: zip::result::ZipError,
    },

    /// The template executor rejected a placeholder.
    #[error("Template error in '{name}': {source}")]
    Render {
        name: String,
        source: TemplateError,
    },

    /// Template-eligible content mixes invalid UTF-8 with characters from the
    /// U+10FF00..=U+10FFFF range, so it has no lossless text view.
    #[error("'{name}' cannot be templated without altering its bytes")]
    NotText { name: String },

    /// Building the output archive failed.
    #[error("Failed to write archive: {0}")]
    Write(#[source] zip::result::ZipError),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A recipient id or attachment name cannot form a safe output file name.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, LureError>`.
pub type Result<T> = std::result::Result<T, LureError>;

impl LureError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a template failure with the name of the document or member it came from.
    pub fn render(name: impl Into<String>, source: TemplateError) -> Self {
        Self::Render {
            name: name.into(),
            source,
        }
    }
}
