//! Error kinds reported by the save workflow

use thiserror::Error;

use super::publish::PublishError;
use super::store::StoreError;
use super::surface::SurfaceError;

/// Outcome of a failed Save, Save As, New or Open.
///
/// Each variant is shown to the user as a notice; none of them is retried by
/// the workflow itself.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Invalid filename: {0}")]
    InvalidName(String),

    #[error("Cannot update {0} file!")]
    ProtectedDocument(String),

    #[error("Failed to publish {name}: {source}")]
    PublishFailed {
        name: String,
        #[source]
        source: PublishError,
    },

    #[error("Failed to write {name}: {source}")]
    StoreWriteFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to read {name}: {source}")]
    StoreReadFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("No saved document named {0}")]
    DocumentNotFound(String),

    #[error("Editor error: {0}")]
    Editor(#[from] SurfaceError),
}

impl SaveError {
    /// Short machine-friendly kind, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SaveError::InvalidName(_) => "invalid_name",
            SaveError::ProtectedDocument(_) => "protected_document",
            SaveError::PublishFailed { .. } => "publish_failed",
            SaveError::StoreWriteFailed { .. } => "store_write_failed",
            SaveError::StoreReadFailed { .. } => "store_read_failed",
            SaveError::DocumentNotFound(_) => "document_not_found",
            SaveError::Editor(_) => "editor",
        }
    }
}
