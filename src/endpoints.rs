//! API endpoint URL construction

use crate::util::encode_path;

/// Endpoint builder for a single KV namespace
#[derive(Debug, Clone)]
pub struct Endpoints {
    namespace_url: String,
}

impl Endpoints {
    /// Create a new endpoints builder
    ///
    /// `api_base` is the API origin plus version path, e.g.
    /// `https://api.cloudflare.com/client/v4`.
    pub fn new(api_base: &str, account_id: &str, namespace_id: &str) -> Self {
        Self {
            namespace_url: format!(
                "{}/accounts/{}/storage/kv/namespaces/{}",
                api_base.trim_end_matches('/'),
                encode_path(account_id),
                encode_path(namespace_id)
            ),
        }
    }

    /// Base URL of the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace_url
    }

    /// Key listing URL
    pub fn keys(&self) -> String {
        format!("{}/keys", self.namespace_url)
    }

    /// Value URL for a single key
    pub fn value(&self, key: &str) -> String {
        format!("{}/values/{}", self.namespace_url, encode_path(key))
    }
}
