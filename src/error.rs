//! Error types for bookizip operations.

use thiserror::Error;

/// Errors that can occur during archive import or export.
///
/// Every variant here is fatal: it aborts the operation that produced it.
/// Non-fatal conditions are reported as [`Diagnostic`]s alongside a
/// successful result instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Network failure: {0}")]
    Network(#[from] Box<ureq::Error>),

    #[error("Document store inconsistency: {0}")]
    Store(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal condition recorded while a pipeline operation continued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A reference resolved outside the expected path prefix and was left
    /// unmodified in the exported content.
    AnomalousLink {
        /// The reference as found in the chapter content.
        reference: String,
        /// Logical location of the chapter containing the reference.
        location: String,
        /// Where the reference resolved to.
        resolved: String,
    },

    /// An attachment could not be read and was omitted from the export.
    AttachmentSkipped { filename: String, reason: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::AnomalousLink {
                reference,
                location,
                resolved,
            } => write!(
                f,
                "anomalous link {reference:?} in {location} resolves to {resolved:?}"
            ),
            Diagnostic::AttachmentSkipped { filename, reason } => {
                write!(f, "skipped attachment {filename:?}: {reason}")
            }
        }
    }
}
