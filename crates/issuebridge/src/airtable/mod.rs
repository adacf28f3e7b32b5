//! Airtable REST client: the record store.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for Airtable API operations
//! - [`types`] - Request and response structures
//! - [`client`] - The client and its [`RecordStore`](crate::platform::RecordStore) impl
//! - [`formula`] - Safe construction of `filterByFormula` expressions
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::airtable::AirtableClient;
//! use issuebridge::platform::{ApiRateLimiter, RecordStore, rate_limits};
//!
//! let limiter = ApiRateLimiter::new(rate_limits::AIRTABLE_DEFAULT_RPS);
//! let client = AirtableClient::new("pat...", "appXXXX", "Issues", Some(limiter))?;
//! let schema = client.fetch_schema().await?;
//! ```

#[cfg(feature = "airtable")]
mod client;
#[cfg(feature = "airtable")]
mod error;
pub mod formula;
#[cfg(feature = "airtable")]
mod types;

#[cfg(feature = "airtable")]
pub use client::{AIRTABLE_API_URL, AirtableClient};
#[cfg(feature = "airtable")]
pub use error::{AirtableError, parse_select_option, short_error_message};
#[cfg(feature = "airtable")]
pub use types::{ApiRecord, FieldMeta, TableMeta};
