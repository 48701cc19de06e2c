//! Integration tests for the Workers KV SDK client

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use kv_storage_sdk::{
    ClientBuilder, EncodedForm, Error, FormBuilder, HttpTransport, ListOpts, PutOpts,
    Representation, RetryPolicy, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

const NAMESPACE_PATH: &str = "/accounts/accountId/storage/kv/namespaces/namespace";

fn value_path(key: &str) -> String {
    format!("{}/values/{}", NAMESPACE_PATH, key)
}

fn keys_path() -> String {
    format!("{}/keys", NAMESPACE_PATH)
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        ..RetryPolicy::default()
    }
}

fn builder(server: &MockServer) -> ClientBuilder {
    ClientBuilder::new("accountId", "namespace")
        .credentials("test@example.com", "test-key")
        .api_base(server.uri())
        .timeout_ms(5000)
        .retry_policy(fast_retries())
        .allow_insecure_http()
}

/// Create a mock server and test client
async fn setup() -> (MockServer, kv_storage_sdk::Client) {
    let server = MockServer::start().await;
    let client = builder(&server).build().expect("Failed to build client");
    (server, client)
}

fn list_body(names: &[&str], count: u32, cursor: &str) -> serde_json::Value {
    let result: Vec<_> = names
        .iter()
        .map(|name| json!({"name": name, "metadata": {"owner": name}}))
        .collect();
    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
        "result_info": {"count": count, "cursor": cursor}
    })
}

#[tokio::test]
async fn test_get_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .and(header("X-Auth-Email", "test@example.com"))
        .and(header("X-Auth-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("value"))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get_text("key").await.expect("Failed to get value");
    assert_eq!(value.as_deref(), Some("value"));
}

#[tokio::test]
async fn test_get_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"foo":"bar"}"#))
        .mount(&server)
        .await;

    let value = client.get("key", Representation::Json).await.unwrap().unwrap();
    assert_eq!(value.as_json(), Some(&json!({"foo": "bar"})));

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Foo {
        foo: String,
    }
    let typed: Option<Foo> = client.get_json("key").await.unwrap();
    assert_eq!(typed, Some(Foo { foo: "bar".to_string() }));
}

#[tokio::test]
async fn test_get_json_with_invalid_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client.get("key", Representation::Json).await;
    assert!(matches!(result, Err(Error::Deserialize(_))));
}

#[tokio::test]
async fn test_get_bytes_and_stream() {
    let (server, client) = setup().await;
    let payload: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();

    Mock::given(method("GET"))
        .and(path(value_path("blob")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let bytes = client.get_bytes("blob").await.unwrap().unwrap();
    assert_eq!(bytes.as_ref(), payload.as_slice());

    let stream = client.get_stream("blob").await.unwrap().unwrap();
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    let streamed: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    assert_eq!(streamed, payload);
}

#[tokio::test]
async fn test_unsupported_representation_fails_before_request() {
    let (server, _client) = setup().await;

    let result = "xml".parse::<Representation>();
    assert!(matches!(result, Err(Error::UnsupportedRepresentation(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_success_reads_are_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("missing")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    for representation in [
        Representation::Text,
        Representation::Json,
        Representation::ArrayBuffer,
        Representation::Stream,
    ] {
        let value = client.get("missing", representation).await.unwrap();
        assert!(value.is_none());
    }
    assert!(client.list(ListOpts::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_success_writes_are_false() {
    let server = MockServer::start().await;
    let client = builder(&server)
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap();

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.put("key", "value", PutOpts::default()).await.unwrap());
    assert!(!client.delete("key").await.unwrap());
}

#[tokio::test]
async fn test_list_all_keys() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": [
                {
                    "name": "My-Key",
                    "expiration": 1577836800,
                    "metadata": {"someMetadataKey": "someMetadataValue"}
                }
            ],
            "result_info": {
                "count": 1,
                "cursor": "6Ck1la0VxJ0djhidm1MdX2FyDGxLKVeeHZZmORS_8XeSuhz9SjIJRaSa2lnsF01tQOHrfTGAP3R5X1Kv5iVUuMbNKhWNAXHOl6ePB0TUL8nw"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.list(ListOpts::default()).await.unwrap().unwrap();

    assert_eq!(page.keys.len(), 1);
    assert_eq!(page.keys[0].name, "My-Key");
    assert_eq!(page.keys[0].expiration, Some(1577836800));
    assert!(page.list_complete);
    assert!(page.cursor.is_some());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_list_with_prefix_limit_and_cursor() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("prefix", "test"))
        .and(query_param("limit", "10"))
        .and(query_param("cursor", "fake-cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            &["test-1"; 10],
            10,
            "next-cursor",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .list(ListOpts {
            prefix: Some("test".to_string()),
            limit: Some(10),
            cursor: Some("fake-cursor".to_string()),
        })
        .await
        .unwrap()
        .unwrap();

    // Count equal to the limit means there may be more
    assert!(!page.list_complete);
    assert_eq!(page.cursor.as_deref(), Some("next-cursor"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].url.query(),
        Some("prefix=test&limit=10&cursor=fake-cursor")
    );
}

#[tokio::test]
async fn test_list_all_follows_cursors() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("prefix", "user:"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            &["user:1", "user:2"],
            1000,
            "page-2",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("prefix", "user:"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&["user:3"], 1, "")))
        .expect(1)
        .mount(&server)
        .await;

    let keys = client.list_all(Some("user:")).await.unwrap().unwrap();
    let names: Vec<_> = keys.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["user:1", "user:2", "user:3"]);
}

#[tokio::test]
async fn test_list_all_stops_on_repeated_cursor() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            &["stuck"],
            1000,
            "same-cursor",
        )))
        .expect(2)
        .mount(&server)
        .await;

    let keys = client.list_all(None).await.unwrap().unwrap();
    assert_eq!(keys.len(), 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
    assert_eq!(requests[1].url.query(), Some("cursor=same-cursor"));
}

#[tokio::test]
async fn test_put_raw_value() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .and(query_param_is_missing("expiration"))
        .and(query_param_is_missing("expiration_ttl"))
        .and(header("X-Auth-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.put("key", "value", PutOpts::default()).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"value".to_vec());
    let is_multipart = requests[0]
        .headers
        .get("content-type")
        .map(|v| v.to_str().unwrap().starts_with("multipart/"))
        .unwrap_or(false);
    assert!(!is_multipart);
}

#[tokio::test]
async fn test_put_with_expiration_and_ttl() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let both = PutOpts {
        expiration: Some(1234),
        expiration_ttl: Some(60),
        ..Default::default()
    };
    assert!(client.put("key", "value", both).await.unwrap());

    let ttl = PutOpts {
        expiration_ttl: Some(1234),
        ..Default::default()
    };
    assert!(client.put("key", "value", ttl).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("expiration=1234"));
    assert_eq!(requests[1].url.query(), Some("expiration_ttl=1234"));
}

#[tokio::test]
async fn test_put_with_metadata_is_multipart() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let opts = PutOpts {
        metadata: Some(json!({"foo": "bar"})),
        ..Default::default()
    };
    assert!(client.put("key", "value", opts).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("multipart content type");
    let body = String::from_utf8(request.body.clone()).unwrap();

    assert!(body.contains(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"value\"\r\n\r\nvalue\r\n",
        boundary
    )));
    assert!(body.contains(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{}\r\n",
        boundary,
        serde_json::to_string(&json!({"foo": "bar"})).unwrap()
    )));
    assert_eq!(request.headers.get("x-auth-email").unwrap(), "test@example.com");
}

#[derive(Debug)]
struct FixedBoundaryForm;

impl FormBuilder for FixedBoundaryForm {
    fn build(&self, value: Bytes, metadata: &serde_json::Value) -> kv_storage_sdk::Result<EncodedForm> {
        let mut body = b"value=".to_vec();
        body.extend_from_slice(&value);
        body.extend_from_slice(b"&metadata=");
        body.extend_from_slice(serde_json::to_string(metadata)?.as_bytes());
        Ok(EncodedForm {
            content_type: "application/x-test-form".to_string(),
            body: Bytes::from(body),
        })
    }
}

#[tokio::test]
async fn test_injected_form_builder() {
    let server = MockServer::start().await;
    let client = builder(&server).form_builder(FixedBoundaryForm).build().unwrap();

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .and(header("content-type", "application/x-test-form"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let opts = PutOpts {
        metadata: Some(json!({"n": 1})),
        ..Default::default()
    };
    assert!(client.put("key", "v", opts).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, br#"value=v&metadata={"n":1}"#.to_vec());
}

#[tokio::test]
async fn test_delete() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.delete("key").await.unwrap());
}

#[tokio::test]
async fn test_backslash_keys_stay_under_values() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("value"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let value = client.get_text("dir\\file").await.unwrap();
    assert_eq!(value.as_deref(), Some("value"));
    assert!(client
        .put("a\\..\\..\\keys", "v", PutOpts::default())
        .await
        .unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), value_path("dir%5Cfile"));
    assert_eq!(
        requests[1].url.path(),
        value_path("a%5C..%5C..%5Ckeys")
    );
}

#[tokio::test]
async fn test_get_with_metadata() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string("value"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .and(query_param("prefix", "key"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"metadata": {"foo": "bar"}}],
            "result_info": {"count": 1, "cursor": "fake_cursor"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = client
        .get_with_metadata("key", Representation::Text)
        .await
        .unwrap();

    assert_eq!(entry.value.unwrap().as_text(), Some("value"));
    assert_eq!(entry.metadata, json!({"foo": "bar"}));
}

#[tokio::test]
async fn test_get_with_metadata_prefers_exact_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string("value"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            &["key-backup", "key"],
            2,
            "",
        )))
        .mount(&server)
        .await;

    let entry = client
        .get_with_metadata("key", Representation::Text)
        .await
        .unwrap();
    assert_eq!(entry.metadata, json!({"owner": "key"}));
}

#[tokio::test]
async fn test_get_with_metadata_defaults_to_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[], 0, "")))
        .mount(&server)
        .await;

    let entry = client
        .get_with_metadata("key", Representation::Json)
        .await
        .unwrap();
    assert!(entry.value.is_none());
    assert_eq!(entry.metadata, json!({}));
}

#[tokio::test]
async fn test_get_retries_transient_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200).set_body_string("after-retry"))
        .mount(&server)
        .await;

    let value = client.get_text("key").await.unwrap();
    assert_eq!(value.as_deref(), Some("after-retry"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_uses_the_same_retry_policy() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client.delete("key").await.unwrap());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_put_with_metadata_is_retried_with_same_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(value_path("key")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let opts = PutOpts {
        metadata: Some(json!({"foo": "bar"})),
        ..Default::default()
    };
    assert!(client.put("key", "value", opts).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    // Nothing listens on port 1
    let client = ClientBuilder::new("accountId", "namespace")
        .credentials("test@example.com", "test-key")
        .api_base("http://127.0.0.1:1")
        .allow_insecure_http()
        .build()
        .unwrap();

    let result = client.get("key", Representation::Text).await;
    match result {
        Err(e) if e.is_transport() => (),
        other => panic!("Expected transport error, got: {:?}", other),
    }
}

/// Records every request and answers from a fixed table
#[derive(Debug, Default)]
struct RecordingTransport {
    seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: reqwest::Request) -> kv_storage_sdk::Result<reqwest::Response> {
        self.seen
            .lock()
            .unwrap()
            .push((request.method().to_string(), request.url().path().to_string()));

        let response = if request.url().path().ends_with("/keys") {
            http::Response::builder()
                .status(200)
                .body(list_body(&["key"], 1, "").to_string())
                .unwrap()
        } else {
            http::Response::builder()
                .status(200)
                .body(r#"{"hello":"world"}"#.to_string())
                .unwrap()
        };
        Ok(reqwest::Response::from(response))
    }
}

#[tokio::test]
async fn test_injected_transport_receives_every_request() {
    let transport = Arc::new(RecordingTransport::default());
    let client = ClientBuilder::new("accountId", "namespace")
        .credentials("test@example.com", "test-key")
        .transport(transport.clone())
        .build()
        .unwrap();

    let entry = client
        .get_with_metadata("key", Representation::Json)
        .await
        .unwrap();
    assert!(matches!(entry.value, Some(Value::Json(_))));
    assert_eq!(entry.metadata, json!({"owner": "key"}));
    assert!(client.delete("key").await.unwrap());

    let mut seen = transport.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (
                "DELETE".to_string(),
                "/client/v4/accounts/accountId/storage/kv/namespaces/namespace/values/key"
                    .to_string()
            ),
            (
                "GET".to_string(),
                "/client/v4/accounts/accountId/storage/kv/namespaces/namespace/keys".to_string()
            ),
            (
                "GET".to_string(),
                "/client/v4/accounts/accountId/storage/kv/namespaces/namespace/values/key"
                    .to_string()
            ),
        ]
    );
}
