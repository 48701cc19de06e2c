//! Utility functions

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in a key path segment: everything but RFC 3986 unreserved
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Extract header value as string
pub fn header_str(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(|s| s.to_string())
}

/// Generate a new request ID
pub fn generate_request_id() -> String {
    format!("sdk-{}", uuid::Uuid::new_v4())
}

/// URL encode a path segment
pub fn encode_path(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, KEY_SEGMENT).to_string()
}
