//! Data models for the Workers KV SDK
//!
//! This module contains the option structs passed to client operations and
//! the values they return.
//!
//! # Key Types
//!
//! * [`Representation`] - How a stored value should be decoded
//! * [`Value`] - A decoded value
//! * [`ListOpts`], [`PutOpts`] - Options for list and put
//! * [`ListPage`], [`KeyInfo`] - One page of a key listing
//! * [`ValueWithMetadata`] - A value plus the metadata stored with it

use crate::errors::{Error, Result};
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

/// Streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How a retrieved value is decoded
///
/// # Example
///
/// ```
/// use kv_storage_sdk::Representation;
///
/// let repr: Representation = "json".parse().unwrap();
/// assert_eq!(repr, Representation::Json);
/// assert_eq!(Representation::default(), Representation::Text);
/// assert!("xml".parse::<Representation>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// UTF-8 text
    #[default]
    Text,
    /// Parsed JSON document
    Json,
    /// Raw bytes, fully buffered
    ArrayBuffer,
    /// Raw bytes, streamed as they arrive
    Stream,
}

impl Representation {
    /// Get the representation name
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Text => "text",
            Representation::Json => "json",
            Representation::ArrayBuffer => "arraybuffer",
            Representation::Stream => "stream",
        }
    }
}

impl FromStr for Representation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Representation::Text),
            "json" => Ok(Representation::Json),
            "arraybuffer" => Ok(Representation::ArrayBuffer),
            "stream" => Ok(Representation::Stream),
            other => Err(Error::UnsupportedRepresentation(other.to_string())),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value decoded according to its [`Representation`]
pub enum Value {
    /// Text body
    Text(String),
    /// JSON body
    Json(serde_json::Value),
    /// Buffered binary body
    Bytes(Bytes),
    /// Streaming binary body
    Stream(ByteStream),
}

impl Value {
    /// The representation this value was decoded as
    pub fn representation(&self) -> Representation {
        match self {
            Value::Text(_) => Representation::Text,
            Value::Json(_) => Representation::Json,
            Value::Bytes(_) => Representation::ArrayBuffer,
            Value::Stream(_) => Representation::Stream,
        }
    }

    /// Text body, if decoded as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON body, if decoded as JSON
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Binary body, if decoded as an array buffer
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Body stream, if requested as a stream
    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            Value::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Value::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Value::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A value plus the metadata stored with its key
#[derive(Debug)]
pub struct ValueWithMetadata {
    /// The value, `None` if the key could not be read
    pub value: Option<Value>,
    /// Metadata of the key, an empty object if none was found
    pub metadata: serde_json::Value,
}

/// Options for listing keys
///
/// Every field is optional; unset fields are left out of the request.
///
/// # Example
///
/// ```
/// use kv_storage_sdk::ListOpts;
///
/// let opts = ListOpts {
///     prefix: Some("user:".to_string()),
///     limit: Some(100),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOpts {
    /// Only list keys starting with this prefix
    pub prefix: Option<String>,
    /// Maximum number of keys per page (service default: 1000)
    pub limit: Option<u32>,
    /// Continuation cursor from a previous page
    pub cursor: Option<String>,
}

impl ListOpts {
    /// Query parameters in request order; empty prefixes/cursors and a zero limit are omitted
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            pairs.push(("prefix", prefix.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = self.cursor.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("cursor", cursor.to_string()));
        }
        pairs
    }

    /// Page size the service applies to this request
    pub(crate) fn effective_limit(&self) -> u32 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(crate::DEFAULT_LIST_LIMIT)
    }
}

/// A key entry in a list response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyInfo {
    /// Key name
    #[serde(default)]
    pub name: String,
    /// Absolute expiration as Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    /// Metadata stored with the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl KeyInfo {
    /// Expiration as a timestamp
    pub fn expires_at(&self) -> Option<time::OffsetDateTime> {
        self.expiration
            .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok())
    }
}

/// One page of a key listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    /// Keys on this page, in service order
    pub keys: Vec<KeyInfo>,
    /// Whether this is the last page
    ///
    /// Computed client-side: the page is complete when it holds fewer keys
    /// than the requested limit (or 1000 when no limit was given).
    pub list_complete: bool,
    /// Cursor for the next page
    pub cursor: Option<String>,
}

/// Raw list response body
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub result: Vec<KeyInfo>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

/// Pagination block of a list response
#[derive(Debug, Deserialize)]
pub(crate) struct ResultInfo {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl ListResponse {
    /// Turn the raw body into a page for a request made with `opts`
    pub(crate) fn into_page(self, opts: &ListOpts) -> ListPage {
        let (count, cursor) = match self.result_info {
            Some(info) => (
                info.count.unwrap_or(self.result.len() as u32),
                info.cursor,
            ),
            None => (self.result.len() as u32, None),
        };

        ListPage {
            list_complete: count < opts.effective_limit(),
            cursor,
            keys: self.result,
        }
    }
}

/// Options for writing a value
///
/// `expiration` and `expiration_ttl` are mutually exclusive; when both are
/// set only `expiration` is sent.
///
/// # Example
///
/// ```
/// use kv_storage_sdk::PutOpts;
/// use serde_json::json;
///
/// // Expire one hour after the write, with metadata
/// let opts = PutOpts {
///     expiration_ttl: Some(3600),
///     metadata: Some(json!({ "owner": "billing" })),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutOpts {
    /// Absolute expiration as Unix seconds
    pub expiration: Option<i64>,
    /// Expiration in seconds from now
    pub expiration_ttl: Option<u64>,
    /// Metadata to store with the key
    pub metadata: Option<serde_json::Value>,
}

impl PutOpts {
    /// Expiration query parameter, absolute expiration first
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        if let Some(expiration) = self.expiration.filter(|e| *e != 0) {
            vec![("expiration", expiration.to_string())]
        } else if let Some(ttl) = self.expiration_ttl.filter(|t| *t != 0) {
            vec![("expiration_ttl", ttl.to_string())]
        } else {
            Vec::new()
        }
    }
}
