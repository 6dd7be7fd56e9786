//! Documents Domain
//!
//! Metadata for files customers keep with the brokerage: IDs, KRA PIN
//! certificates, logbooks, receipts. The bytes live in object storage under
//! `s3_key`; only staff can mark a document verified.

pub mod document;
pub mod error;

pub use document::{Document, DocumentType, NewDocument, download_url};
pub use error::DocumentError;
