use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that abort an import as a whole.
///
/// Failures of individual records never abort; they are collected in the
/// `ImportReport`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("Import document could not be parsed: {0}")]
    InvalidDocument(String),

    #[error("Import document is missing sections: {0}")]
    MissingSections(String),

    #[error("Storage error during import: {0}")]
    Storage(String),
}

impl From<DomainError> for ImportError {
    fn from(err: DomainError) -> Self {
        ImportError::Storage(err.to_string())
    }
}
