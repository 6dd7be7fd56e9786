//! Gateway errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not decode {gateway} response: {message}")]
    Decode { gateway: &'static str, message: String },

    #[error("{gateway} rejected the request: {message}")]
    Rejected { gateway: &'static str, message: String },

    #[error("Failed to authenticate with {0}")]
    Authentication(&'static str),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid amount: {0}")]
    Amount(#[from] core_kernel::MoneyError),
}

impl GatewayError {
    pub(crate) fn decode(gateway: &'static str, err: impl ToString) -> Self {
        GatewayError::Decode { gateway, message: err.to_string() }
    }
}
