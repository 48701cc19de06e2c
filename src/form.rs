//! Multipart form encoding for writes that carry metadata
//!
//! A put with metadata is sent as `multipart/form-data` with two parts:
//! `value` holding the raw value and `metadata` holding the metadata as JSON
//! text. The body is encoded up front so the request stays cloneable and can
//! be replayed by the retrying transport.

use crate::errors::Result;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// An encoded form body and the content type announcing its boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedForm {
    /// Value for the `Content-Type` header
    pub content_type: String,
    /// Encoded body
    pub body: Bytes,
}

/// Builds the form body for a put with metadata
///
/// Implement this to control the exact encoding, e.g. to pin the boundary in
/// tests.
pub trait FormBuilder: Send + Sync + fmt::Debug {
    /// Encode `value` and `metadata` into a form body
    fn build(&self, value: Bytes, metadata: &serde_json::Value) -> Result<EncodedForm>;
}

/// Default `multipart/form-data` encoder with a random boundary
#[derive(Debug, Clone, Default)]
pub struct MultipartFormBuilder;

impl MultipartFormBuilder {
    fn encode(boundary: &str, value: &[u8], metadata: &str) -> Bytes {
        let mut body = BytesMut::with_capacity(value.len() + metadata.len() + 4 * boundary.len() + 128);

        for (name, content) in [("value", value), ("metadata", metadata.as_bytes())] {
            body.put_slice(b"--");
            body.put_slice(boundary.as_bytes());
            body.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
            body.put_slice(name.as_bytes());
            body.put_slice(b"\"\r\n\r\n");
            body.put_slice(content);
            body.put_slice(b"\r\n");
        }

        body.put_slice(b"--");
        body.put_slice(boundary.as_bytes());
        body.put_slice(b"--\r\n");
        body.freeze()
    }
}

impl FormBuilder for MultipartFormBuilder {
    fn build(&self, value: Bytes, metadata: &serde_json::Value) -> Result<EncodedForm> {
        let boundary = format!("kv-storage-sdk-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::to_string(metadata)?;

        Ok(EncodedForm {
            content_type: format!("multipart/form-data; boundary={}", boundary),
            body: Self::encode(&boundary, &value, &metadata),
        })
    }
}
