//! Client for the external clinical coding API.
//!
//! The AI suggestion, analysis, search and rationale services, as well as the
//! host application's encounter update endpoint, are opaque collaborators.
//! This crate owns their wire contract, the HTTP transport (timeout plus
//! bounded retry with linear backoff), and the mapping of failures onto a
//! small set of error kinds.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod retry;
pub mod wire;

pub use catalog::{CatalogCode, CodeCatalog};
pub use client::{CodingApi, HttpCodingApi};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use mock::{MockCall, MockCodingApi};
pub use retry::RetryPolicy;
pub use wire::*;
