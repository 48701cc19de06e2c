//! HTTP transport layer
//!
//! Every request the client makes goes through an [`HttpTransport`]. The
//! default is [`ReqwestTransport`]; the client always wraps whichever
//! transport it is given in a [`RetryingTransport`] so that transient
//! statuses are retried the same way for every operation.
//!
//! # Custom transports
//!
//! ```
//! use async_trait::async_trait;
//! use kv_storage_sdk::{ClientBuilder, HttpTransport, Result};
//!
//! #[derive(Debug)]
//! struct AlwaysMissing;
//!
//! #[async_trait]
//! impl HttpTransport for AlwaysMissing {
//!     async fn execute(&self, _request: reqwest::Request) -> Result<reqwest::Response> {
//!         let response = http::Response::builder().status(404).body("").unwrap();
//!         Ok(reqwest::Response::from(response))
//!     }
//! }
//!
//! let client = ClientBuilder::new("account-id", "namespace-id")
//!     .credentials("ops@example.com", "global-api-key")
//!     .transport(AlwaysMissing)
//!     .build()
//!     .unwrap();
//! ```

use crate::{
    config::RetryPolicy,
    errors::{Error, Result},
};
use async_trait::async_trait;
use backoff::future::retry_notify;
use reqwest::{Client as HttpClient, Request, Response};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Sends a single HTTP request
///
/// Implementations report transport failures (connection, DNS, TLS,
/// timeout) as errors and return every HTTP response, whatever its status,
/// as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send the request and return the response
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

/// Transport backed by a [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    /// Wrap an existing reqwest client
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Build a reqwest client with the given request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(http))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.http.execute(request).await.map_err(Error::from)
    }
}

/// Why a single attempt did not produce a final response
#[derive(Debug)]
enum AttemptFailure {
    /// Response with a retryable status
    Status(Response),
    /// Transport error, never retried
    Transport(Error),
}

/// Transport wrapper retrying responses with transient statuses
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Wrap `inner` with `policy`
    pub fn new(inner: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        // A streaming body can only be sent once
        if self.policy.max_retries == 0 || request.try_clone().is_none() {
            return self.inner.execute(request).await;
        }

        let inner = self.inner.clone();
        let policy = self.policy.clone();
        let max_retries = policy.max_retries;
        let mut attempt: u32 = 0;

        let result = retry_notify(
            self.policy.backoff(),
            move || {
                let current = attempt;
                attempt += 1;
                let next = request.try_clone();
                let inner = inner.clone();
                let policy = policy.clone();

                async move {
                    let Some(req) = next else {
                        return Err(backoff::Error::permanent(AttemptFailure::Transport(
                            Error::Other("Request cannot be cloned".to_string()),
                        )));
                    };

                    match inner.execute(req).await {
                        Ok(response) if policy.should_retry(response.status()) => {
                            if current < max_retries {
                                Err(backoff::Error::transient(AttemptFailure::Status(response)))
                            } else {
                                trace!(
                                    "Retries exhausted, returning status {}",
                                    response.status()
                                );
                                Ok(response)
                            }
                        }
                        Ok(response) => Ok(response),
                        Err(e) => Err(backoff::Error::permanent(AttemptFailure::Transport(e))),
                    }
                }
            },
            |failure: AttemptFailure, wait: Duration| match failure {
                AttemptFailure::Status(response) => {
                    debug!("Retrying after {:?} due to status {}", wait, response.status())
                }
                AttemptFailure::Transport(e) => debug!("Retrying after {:?} due to: {}", wait, e),
            },
        )
        .await;

        match result {
            Ok(response) => Ok(response),
            // Out of time before out of attempts
            Err(AttemptFailure::Status(response)) => Ok(response),
            Err(AttemptFailure::Transport(e)) => Err(e),
        }
    }
}
