//! Error types for redocx library.

use std::io;
use thiserror::Error;

/// Result type alias for redocx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document reconstruction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON input or configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive read or write failure.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML part could not be read back while verifying a package.
    #[error("XML error: {0}")]
    Xml(String),

    /// A page's provider output was unusable. The page is skipped.
    #[error("Page {page} could not be ingested: {reason}")]
    Ingestion {
        /// Page index (0-based)
        page: usize,
        /// Why the page was rejected
        reason: String,
    },

    /// The package is not internally consistent. Fatal for the whole run.
    #[error("Package integrity violation: {0}")]
    PackageIntegrity(String),

    /// The extraction provider failed outside of a single page.
    #[error("Extraction provider error: {0}")]
    Provider(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// A configuration value is out of its valid domain.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The whole conversion was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl Error {
    /// Build an ingestion error for a page.
    pub fn ingestion(page: usize, reason: impl Into<String>) -> Self {
        Error::Ingestion {
            page,
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the whole conversion.
    ///
    /// Ingestion failures are isolated to their page; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Ingestion { .. })
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
