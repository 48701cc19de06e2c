//! Workers KV Client Implementation
//!
//! This module contains the main `Client` struct that provides the core functionality
//! for reading and writing keys in one KV namespace.
//!
//! # Architecture
//!
//! The client is designed with the following key components:
//! - **Endpoints**: Namespace, key listing and value URLs derived from the account and namespace ids
//! - **Transport**: Any [`HttpTransport`], wrapped by the retry policy
//! - **Form builder**: Encodes writes that carry metadata as multipart bodies
//! - **Telemetry**: Optional OpenTelemetry integration for observability
//!
//! The client keeps no state about stored entries; every call is one
//! independent request (two for [`Client::get_with_metadata`]).
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use kv_storage_sdk::{ClientBuilder, ListOpts, PutOpts};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::new("account-id", "namespace-id")
//!     .credentials("ops@example.com", "global-api-key")
//!     .build()?;
//!
//! client.put("user:1", "alice", PutOpts::default()).await?;
//! let name = client.get_text("user:1").await?;
//! assert_eq!(name.as_deref(), Some("alice"));
//!
//! let page = client.list(ListOpts { prefix: Some("user:".into()), ..Default::default() }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## With Retries
//!
//! ```no_run
//! use kv_storage_sdk::ClientBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::new("account-id", "namespace-id")
//!     .credentials("ops@example.com", "global-api-key")
//!     .retries(5) // Up to 5 retries on 429/500/503
//!     .timeout_ms(10000) // 10 second timeout
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::{
    config::ClientConfig,
    endpoints::Endpoints,
    errors::{Error, Result},
    form::FormBuilder,
    models::*,
    telemetry::{InFlightGuard, Metrics, TelemetryConfig},
    transport::HttpTransport,
    util::{generate_request_id, header_str},
};

use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Body, Method, Request, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

const USER_AGENT_PREFIX: &str = "kv-storage-sdk-rust";

/// Workers KV client
///
/// The main client for one KV namespace. Provides get, put, delete, list
/// and get-with-metadata operations. Cheap to clone; clones share the
/// transport.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    form_builder: Arc<dyn FormBuilder>,
    endpoints: Endpoints,
    user_agent: String,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("namespace_url", &self.endpoints.namespace())
            .field("timeout", &self.config.timeout)
            .field("retries", &self.config.retry_policy.max_retries)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Client {
    /// Create a new client with the given configuration
    pub(crate) fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        form_builder: Arc<dyn FormBuilder>,
    ) -> Result<Self> {
        // Build user agent
        let user_agent = if let Some(suffix) = &config.user_agent_suffix {
            format!("{}/{} {}", USER_AGENT_PREFIX, crate::VERSION, suffix)
        } else {
            format!("{}/{}", USER_AGENT_PREFIX, crate::VERSION)
        };
        // Fail at build time rather than on the first request
        let _ = HeaderValue::from_str(&user_agent)
            .map_err(|e| Error::Config(format!("Invalid user agent: {}", e)))?;

        Ok(Self {
            endpoints: Endpoints::new(&config.api_base, &config.account_id, &config.namespace_id),
            metrics: init_metrics(&config.telemetry_config),
            transport,
            form_builder,
            user_agent,
            config,
        })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL of the namespace
    pub fn namespace_url(&self) -> &str {
        self.endpoints.namespace()
    }

    /// Get a value
    ///
    /// Reads `key` and decodes the body as `representation`.
    ///
    /// # Returns
    ///
    /// `Ok(Some(value))` on a 2xx response. `Ok(None)` for any other status,
    /// which usually means the key does not exist.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidKey` if the key is empty, `.` or `..`
    /// * `Error::Deserialize` if a JSON representation was requested and the body is not JSON
    /// * `Error::Network` / `Error::Timeout` for transport failures
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kv_storage_sdk::{Client, Representation};
    /// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    /// // Representation names can come from user input
    /// let representation: Representation = "json".parse()?;
    /// match client.get("settings", representation).await? {
    ///     Some(value) => println!("settings: {:?}", value.as_json()),
    ///     None => println!("no settings"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, key: &str, representation: Representation) -> Result<Option<Value>> {
        validate_key(key)?;

        let url = self.endpoints.value(key);
        let request = self.build_request(Method::GET, &url, &[])?;
        let response = self.send("get", request).await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let value = match representation {
            Representation::Text => Value::Text(response.text().await?),
            Representation::Json => Value::Json(response.json().await?),
            Representation::ArrayBuffer => Value::Bytes(response.bytes().await?),
            Representation::Stream => {
                Value::Stream(Box::pin(response.bytes_stream().map_err(Error::from)))
            }
        };
        trace!("Decoded {} as {}", key, representation);

        Ok(Some(value))
    }

    /// Get a value as text
    pub async fn get_text(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get(key, Representation::Text).await? {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        })
    }

    /// Get a value as JSON, deserialized into `T`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kv_storage_sdk::Client;
    /// # use std::collections::HashMap;
    /// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    /// let flags: Option<HashMap<String, bool>> = client.get_json("feature-flags").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key, Representation::Json).await? {
            Some(Value::Json(json)) => Ok(Some(serde_json::from_value(json)?)),
            _ => Ok(None),
        }
    }

    /// Get a value as raw bytes
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(match self.get(key, Representation::ArrayBuffer).await? {
            Some(Value::Bytes(bytes)) => Some(bytes),
            _ => None,
        })
    }

    /// Get a value as a stream of byte chunks
    pub async fn get_stream(&self, key: &str) -> Result<Option<ByteStream>> {
        Ok(self
            .get(key, Representation::Stream)
            .await?
            .and_then(Value::into_stream))
    }

    /// Get a value together with its metadata
    ///
    /// Issues the value read and a prefix listing (`prefix = key`,
    /// `limit = 10`) concurrently and waits for both. The service has no
    /// single-key metadata endpoint, so metadata comes from the listing: the
    /// entry whose name equals `key`, or the first listed entry if none
    /// matches exactly. Metadata is an empty object when nothing was listed.
    ///
    /// Dropping the returned future cancels both requests.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kv_storage_sdk::{Client, Representation};
    /// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    /// let entry = client.get_with_metadata("avatar:42", Representation::ArrayBuffer).await?;
    /// if let Some(content_type) = entry.metadata.get("contentType") {
    ///     println!("avatar is {}", content_type);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_with_metadata(
        &self,
        key: &str,
        representation: Representation,
    ) -> Result<ValueWithMetadata> {
        validate_key(key)?;

        let list_opts = ListOpts {
            prefix: Some(key.to_string()),
            limit: Some(crate::METADATA_LIST_LIMIT),
            cursor: None,
        };

        let (value, page) = tokio::join!(self.get(key, representation), self.list(list_opts));
        let value = value?;
        let metadata = page?
            .and_then(|page| metadata_for_key(key, page.keys))
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        Ok(ValueWithMetadata { value, metadata })
    }

    /// Put a value into the namespace
    ///
    /// Creates or overwrites `key`. Without metadata the value is sent as
    /// the raw body; with metadata it is sent as a multipart form with a
    /// `value` part and a `metadata` part holding the metadata as JSON.
    ///
    /// # Returns
    ///
    /// `Ok(true)` on a 2xx response, `Ok(false)` otherwise.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kv_storage_sdk::{Client, PutOpts};
    /// # use serde_json::json;
    /// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    /// // Simple put
    /// client.put("greeting", "hello", PutOpts::default()).await?;
    ///
    /// // Binary value that expires in an hour, with metadata
    /// let opts = PutOpts {
    ///     expiration_ttl: Some(3600),
    ///     metadata: Some(json!({ "contentType": "image/png" })),
    ///     ..Default::default()
    /// };
    /// let png: Vec<u8> = std::fs::read("avatar.png")?;
    /// if !client.put("avatar:42", png, opts).await? {
    ///     eprintln!("write rejected");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn put(&self, key: &str, value: impl Into<Bytes>, opts: PutOpts) -> Result<bool> {
        validate_key(key)?;

        let url = self.endpoints.value(key);
        let mut request = self.build_request(Method::PUT, &url, &opts.query_pairs())?;
        let value = value.into();

        match &opts.metadata {
            None => {
                *request.body_mut() = Some(Body::from(value));
            }
            Some(metadata) => {
                let form = self.form_builder.build(value, metadata)?;
                let content_type = HeaderValue::from_str(&form.content_type)
                    .map_err(|e| Error::Other(format!("Invalid form content type: {}", e)))?;
                let _ = request.headers_mut().insert(CONTENT_TYPE, content_type);
                *request.body_mut() = Some(Body::from(form.body));
            }
        }

        let response = self.send("put", request).await?;
        Ok(response.status().is_success())
    }

    /// Delete a key from the namespace
    ///
    /// Returns `Ok(true)` on a 2xx response, `Ok(false)` otherwise.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let url = self.endpoints.value(key);
        let request = self.build_request(Method::DELETE, &url, &[])?;
        let response = self.send("delete", request).await?;

        Ok(response.status().is_success())
    }

    /// List keys in the namespace
    ///
    /// Returns one page. Feed [`ListPage::cursor`] back through
    /// [`ListOpts::cursor`] to fetch the next page.
    ///
    /// # Returns
    ///
    /// `Ok(Some(page))` on a 2xx response, `Ok(None)` otherwise.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use kv_storage_sdk::{Client, ListOpts};
    /// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    /// let opts = ListOpts {
    ///     prefix: Some("session:".to_string()),
    ///     limit: Some(100),
    ///     ..Default::default()
    /// };
    /// if let Some(page) = client.list(opts).await? {
    ///     for key in &page.keys {
    ///         println!("{} expires at {:?}", key.name, key.expires_at());
    ///     }
    ///     println!("complete: {}", page.list_complete);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list(&self, opts: ListOpts) -> Result<Option<ListPage>> {
        let url = self.endpoints.keys();
        let request = self.build_request(Method::GET, &url, &opts.query_pairs())?;
        let response = self.send("list", request).await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: ListResponse = response.json().await?;
        Ok(Some(body.into_page(&opts)))
    }

    /// List every key under `prefix`, following cursors until the last page
    ///
    /// Returns `Ok(None)` if any page comes back with a non-success status.
    /// Stops early if the service hands back the cursor it was just sent.
    pub async fn list_all(&self, prefix: Option<&str>) -> Result<Option<Vec<KeyInfo>>> {
        let mut keys = Vec::new();
        let mut opts = ListOpts {
            prefix: prefix.map(str::to_string),
            ..Default::default()
        };

        loop {
            let Some(page) = self.list(opts.clone()).await? else {
                return Ok(None);
            };
            keys.extend(page.keys);

            match page.cursor {
                Some(cursor) if opts.cursor.as_deref() == Some(cursor.as_str()) => {
                    warn!("Listing returned the cursor it was given ({}), stopping", cursor);
                    return Ok(Some(keys));
                }
                Some(cursor) if !page.list_complete && !cursor.is_empty() => {
                    trace!("Continuing listing at cursor {}", cursor);
                    opts.cursor = Some(cursor);
                }
                _ => return Ok(Some(keys)),
            }
        }
    }

    // Helper methods

    /// Build a request carrying auth, request id and user agent headers
    fn build_request(
        &self,
        method: Method,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<Request> {
        let mut url =
            Url::parse(url).map_err(|e| Error::Config(format!("Invalid URL {}: {}", url, e)))?;
        if !query.is_empty() {
            let _ = url
                .query_pairs_mut()
                .extend_pairs(query.iter().map(|(name, value)| (*name, value.as_str())));
        }

        let mut request = Request::new(method, url);
        let headers = request.headers_mut();

        for (name, value) in self.config.credentials.headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::Config(format!("Invalid {} header: {}", name, e)))?;
            let _ = headers.insert(HeaderName::from_static(name), value);
        }

        let request_id = generate_request_id();
        let request_id = HeaderValue::from_str(&request_id)
            .map_err(|e| Error::Other(format!("Invalid request id: {}", e)))?;
        let _ = headers.insert(HeaderName::from_static("x-request-id"), request_id);

        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| Error::Config(format!("Invalid user agent: {}", e)))?;
        let _ = headers.insert(USER_AGENT, user_agent);

        Ok(request)
    }

    /// Send a request through the transport, recording logs and metrics
    async fn send(&self, operation: &'static str, request: Request) -> Result<Response> {
        debug!("{} {} ({})", request.method(), request.url().path(), operation);

        let in_flight = InFlightGuard::enter(&self.metrics);
        let start_time = Instant::now();
        let result = self.transport.execute(request).await;
        drop(in_flight);

        match &result {
            Ok(response) => {
                let status = response.status();
                self.metrics
                    .record_request(operation, status.as_u16(), start_time.elapsed().as_secs_f64());

                if status.is_success() {
                    trace!("{} succeeded with status {}", operation, status);
                } else {
                    debug!(
                        "{} returned status {} (cf-ray={:?})",
                        operation,
                        status,
                        header_str(response.headers(), "cf-ray")
                    );
                }
            }
            Err(e) => {
                self.metrics.record_transport_error(operation);
                warn!("{} failed in transport: {}", operation, e);
            }
        }

        result
    }
}

/// Metrics sink for a new client
#[cfg(feature = "metrics")]
fn init_metrics(config: &TelemetryConfig) -> Arc<Metrics> {
    if config.enabled {
        crate::telemetry::init_telemetry(config.clone())
    } else {
        Arc::new(Metrics::new(config))
    }
}

#[cfg(not(feature = "metrics"))]
fn init_metrics(config: &TelemetryConfig) -> Arc<Metrics> {
    Arc::new(Metrics::new(config))
}

/// Reject keys that cannot be addressed as a single path segment
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Pick the metadata for `key` out of a prefix listing
///
/// Prefers the entry named exactly `key`; falls back to the first entry.
fn metadata_for_key(key: &str, keys: Vec<KeyInfo>) -> Option<serde_json::Value> {
    let index = keys.iter().position(|info| info.name == key).unwrap_or(0);
    keys.into_iter().nth(index)?.metadata
}
