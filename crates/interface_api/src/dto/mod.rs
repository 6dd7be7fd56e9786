//! Request and response bodies

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod claims;
pub mod insights;
pub mod payments;
pub mod policies;
pub mod records;

use serde::Serialize;

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A list with its length, as returned by every listing endpoint
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(results: Vec<T>) -> Self {
        Self { count: results.len(), results }
    }
}
