//! Document domain errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Unknown document type: {0}")]
    UnknownType(String),

    #[error("Document is already verified")]
    AlreadyVerified,

    #[error("Validation error: {0}")]
    Validation(String),
}
