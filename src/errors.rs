//! Error types and handling for the Workers KV SDK
//!
//! Non-success HTTP statuses are not errors in this SDK: reads return
//! `Ok(None)` and writes return `Ok(false)`. The [`Error`] type covers
//! everything else.
//!
//! # Error Categories
//!
//! - **Network Errors**: Connection, DNS and TLS failures
//! - **Timeout**: Request deadline exceeded
//! - **Deserialization**: A success response whose body could not be decoded
//! - **Configuration**: Invalid client configuration
//! - **Invalid Key**: A key that cannot form a request path (empty, `.` or `..`)
//! - **Unsupported Representation**: An unknown value representation name
//!
//! # Example
//!
//! ```no_run
//! # use kv_storage_sdk::{Client, Error, Representation};
//! # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
//! match client.get("settings", Representation::Json).await {
//!     Ok(Some(value)) => println!("settings: {:?}", value),
//!     Ok(None) => println!("no settings stored"),
//!     Err(Error::Timeout) => println!("Request timed out"),
//!     Err(Error::Deserialize(msg)) => println!("stored value is not JSON: {}", msg),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

/// Result type alias for the SDK
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
#[derive(Error, Debug)]
pub enum Error {
    /// Deserialization error
    #[error("deserialize: {0}")]
    Deserialize(String),

    /// Network error
    #[error("network: {0}")]
    Network(String),

    /// Request timeout
    #[error("timeout")]
    Timeout,

    /// Configuration error
    #[error("config: {0}")]
    Config(String),

    /// Key cannot be addressed in a request path
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Requested value representation is not one of text, json, arraybuffer or stream
    #[error("unsupported representation: {0}")]
    UnsupportedRepresentation(String),

    /// Other errors
    #[error("other: {0}")]
    Other(String),
}

impl Error {
    /// Check if the error comes from the transport rather than the SDK itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() || err.is_request() {
            Error::Network(err.to_string())
        } else if err.is_decode() {
            Error::Deserialize(err.to_string())
        } else {
            Error::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialize(err.to_string())
    }
}
