//! Notification domain errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Unknown notification type: {0}")]
    UnknownKind(String),

    #[error("Missing localized message: {0}")]
    MissingMessage(String),

    #[error("Localization error: {0}")]
    Localization(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
