//! Workers KV SDK for Rust
//!
//! An async client for the Cloudflare Workers KV REST API. Each method maps
//! to one authenticated HTTP request against a single namespace and maps the
//! response back into a typed value.
//!
//! # Features
//!
//! - Async/await support with tokio runtime
//! - Values decoded as text, JSON, raw bytes or a byte stream
//! - Key listing with prefix filters and cursor pagination
//! - Per-key metadata and expiration on writes
//! - Automatic retries on transient status codes (429, 500, 503)
//! - Pluggable HTTP transport and multipart form builder
//!
//! # Example
//!
//! ```no_run
//! use kv_storage_sdk::{ClientBuilder, PutOpts};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("account-id", "namespace-id")
//!         .credentials("ops@example.com", "global-api-key")
//!         .build()?;
//!
//!     let stored = client.put("greeting", "hello", PutOpts::default()).await?;
//!     assert!(stored);
//!
//!     if let Some(value) = client.get_text("greeting").await? {
//!         println!("greeting = {}", value);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Missing keys and failed writes
//!
//! Non-success HTTP responses are not errors. Reads return `Ok(None)` and
//! writes return `Ok(false)`. Only transport failures (connection, timeout,
//! TLS) and undecodable success bodies surface as [`Error`].

#![deny(
    missing_docs,
    missing_debug_implementations,
    unsafe_code,
    unused_results
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod auth;
mod client;
mod config;
mod endpoints;
mod errors;
mod form;
mod models;
/// Telemetry and observability support
#[cfg(feature = "metrics")]
pub mod telemetry;

#[cfg(not(feature = "metrics"))]
mod telemetry;
mod transport;
mod util;

pub use auth::Credentials;
pub use client::Client;
pub use config::{ClientBuilder, ClientConfig, RetryPolicy};
pub use errors::{Error, Result};
pub use form::{EncodedForm, FormBuilder, MultipartFormBuilder};
pub use models::*;
pub use transport::{HttpTransport, ReqwestTransport, RetryingTransport};

// Re-export commonly used types
pub use secrecy::SecretString;

/// SDK version, matches Cargo.toml version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default API origin and version path
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries on transient status codes
pub const DEFAULT_RETRIES: u32 = 3;

/// Page size the service applies when a list call sets no limit
pub const DEFAULT_LIST_LIMIT: u32 = 1000;

/// Page size used by [`Client::get_with_metadata`] to look up metadata
pub const METADATA_LIST_LIMIT: u32 = 10;
