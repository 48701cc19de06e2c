//! Client configuration, retry policy and the builder that validates both

use crate::{
    auth::Credentials,
    errors::Result,
    form::{FormBuilder, MultipartFormBuilder},
    telemetry::TelemetryConfig,
    transport::{HttpTransport, ReqwestTransport, RetryingTransport},
    Error,
};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Account identifier
    pub account_id: String,
    /// KV namespace identifier
    pub namespace_id: String,
    /// Credentials sent with every request
    pub credentials: Credentials,
    /// API origin and version path
    pub api_base: String,
    /// Request timeout of the default transport
    pub timeout: Duration,
    /// Retry policy applied to every request
    pub retry_policy: RetryPolicy,
    /// User agent suffix
    pub user_agent_suffix: Option<String>,
    /// Telemetry configuration
    pub telemetry_config: TelemetryConfig,
}

/// Which responses are retried, and how long to wait between attempts
///
/// Only HTTP statuses in `retry_on` are retried. Transport failures are
/// returned to the caller as-is. Once retries run out, the last response is
/// handed back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Status codes that trigger a retry
    pub retry_on: Vec<u16>,
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Upper bound for a single delay
    pub max_interval: Duration,
    /// Give up retrying once this much time has passed
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_RETRIES,
            retry_on: vec![429, 500, 503],
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a response with this status should be retried
    pub(crate) fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_on.contains(&status.as_u16())
    }

    /// Backoff schedule for one request
    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_randomization_factor(0.3)
            .with_multiplier(2.0)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed_time))
            .build()
    }
}

/// Builder for creating a configured Client
#[derive(Debug)]
pub struct ClientBuilder {
    account_id: String,
    namespace_id: String,
    credentials: Option<Credentials>,
    api_base: String,
    timeout_ms: u64,
    retry_policy: RetryPolicy,
    user_agent_suffix: Option<String>,
    transport: Option<Arc<dyn HttpTransport>>,
    form_builder: Option<Arc<dyn FormBuilder>>,
    telemetry_config: TelemetryConfig,
    allow_insecure_http: bool,
}

impl ClientBuilder {
    /// Create a new client builder for one namespace
    ///
    /// # Arguments
    ///
    /// * `account_id` - Account identifier
    /// * `namespace_id` - KV namespace identifier
    pub fn new(account_id: impl Into<String>, namespace_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            namespace_id: namespace_id.into(),
            credentials: None,
            api_base: crate::DEFAULT_API_BASE.to_string(),
            timeout_ms: crate::DEFAULT_TIMEOUT_MS,
            retry_policy: RetryPolicy::default(),
            user_agent_suffix: None,
            transport: None,
            form_builder: None,
            telemetry_config: TelemetryConfig::default(),
            allow_insecure_http: false,
        }
    }

    /// Set the account email and API key
    pub fn credentials(mut self, auth_email: impl Into<String>, auth_key: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(auth_email, auth_key));
        self
    }

    /// Override the API origin and version path
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the request timeout in milliseconds
    ///
    /// Applies to the default transport only; an injected transport owns its timeouts.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the number of retries on transient status codes
    pub fn retries(mut self, retries: u32) -> Self {
        self.retry_policy.max_retries = retries;
        self
    }

    /// Replace the whole retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Add a custom user agent suffix
    pub fn user_agent_extra(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Send requests through a custom transport instead of the default reqwest client
    ///
    /// The transport is still wrapped by the retry policy.
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Encode metadata writes with a custom form builder
    pub fn form_builder(mut self, form_builder: impl FormBuilder + 'static) -> Self {
        self.form_builder = Some(Arc::new(form_builder));
        self
    }

    /// Configure telemetry/metrics
    #[cfg(feature = "metrics")]
    pub fn with_telemetry(mut self, config: TelemetryConfig) -> Self {
        self.telemetry_config = config;
        self
    }

    /// Enable telemetry with default settings
    #[cfg(feature = "metrics")]
    pub fn enable_telemetry(mut self) -> Self {
        self.telemetry_config.enabled = true;
        self
    }

    /// Allow a plain `http://` API base, e.g. a local mock server
    pub fn allow_insecure_http(mut self) -> Self {
        self.allow_insecure_http = true;
        self
    }

    /// Build the client with the configured options
    pub fn build(self) -> Result<crate::Client> {
        if self.account_id.is_empty() {
            return Err(Error::Config("Account ID must not be empty".to_string()));
        }
        if self.namespace_id.is_empty() {
            return Err(Error::Config("Namespace ID must not be empty".to_string()));
        }

        // Require authentication
        let credentials = self.credentials.ok_or_else(|| {
            Error::Config(
                "Credentials are required. Use .credentials() to set the auth email and key"
                    .to_string(),
            )
        })?;

        let api_base = self.api_base.trim_end_matches('/');

        if api_base.starts_with("http://") && !self.allow_insecure_http {
            return Err(Error::Config(
                "HTTP URLs are not allowed. Use .allow_insecure_http() (dangerous!)".to_string(),
            ));
        }
        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            return Err(Error::Config(
                "API base must start with http:// or https://".to_string(),
            ));
        }

        let config = ClientConfig {
            account_id: self.account_id,
            namespace_id: self.namespace_id,
            credentials,
            api_base: api_base.to_string(),
            timeout: Duration::from_millis(self.timeout_ms),
            retry_policy: self.retry_policy,
            user_agent_suffix: self.user_agent_suffix,
            telemetry_config: self.telemetry_config,
        };

        let inner: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_timeout(config.timeout)?),
        };
        let transport = RetryingTransport::new(inner, config.retry_policy.clone());

        let form_builder: Arc<dyn FormBuilder> = self
            .form_builder
            .unwrap_or_else(|| Arc::new(MultipartFormBuilder));

        crate::client::Client::new(config, Arc::new(transport), form_builder)
    }
}
