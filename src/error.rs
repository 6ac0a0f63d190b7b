//! Error types for basalt operations.

use thiserror::Error;

/// Errors that can occur while reading a book or preparing a section for display.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    /// The container parsed, but its spine/TOC structure is inconsistent.
    #[error("Malformed book: {0}")]
    MalformedBook(String),

    /// A stylesheet, import, or link points outside the container.
    #[error("Refusing to load resource outside the book: {0}")]
    ExternalResource(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// An internal contract was violated. Indicates a bug, not bad input.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("CSS error: {0}")]
    Css(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
