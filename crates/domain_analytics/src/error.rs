//! Analytics domain errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Unknown activity action: {0}")]
    UnknownAction(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),
}
