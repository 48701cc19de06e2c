//! Basic usage example for the Workers KV SDK
//!
//! Reads `CF_ACCOUNT_ID`, `CF_NAMESPACE_ID`, `CF_AUTH_EMAIL` and
//! `CF_AUTH_KEY` from the environment. Set `RUST_LOG=kv_storage_sdk=debug`
//! to see every request.

use futures_util::TryStreamExt;
use kv_storage_sdk::{Client, ClientBuilder, ListOpts, PutOpts, Representation};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Initialize the client
    let client = create_client()?;

    // Example 1: Put values
    println!("=== Example 1: Put values ===");
    put_example(&client).await?;

    // Example 2: Get values
    println!("\n=== Example 2: Get values ===");
    get_example(&client).await?;

    // Example 3: List keys
    println!("\n=== Example 3: List keys ===");
    list_example(&client).await?;

    // Example 4: Value with metadata
    println!("\n=== Example 4: Value with metadata ===");
    metadata_example(&client).await?;

    // Example 5: Delete
    println!("\n=== Example 5: Delete ===");
    delete_example(&client).await?;

    Ok(())
}

fn create_client() -> Result<Client, Box<dyn std::error::Error>> {
    // Get configuration from environment
    let account_id = std::env::var("CF_ACCOUNT_ID")?;
    let namespace_id = std::env::var("CF_NAMESPACE_ID")?;
    let auth_email = std::env::var("CF_AUTH_EMAIL")?;
    let auth_key = std::env::var("CF_AUTH_KEY")?;

    let client = ClientBuilder::new(account_id, namespace_id)
        .credentials(auth_email, auth_key)
        .user_agent_extra("demos/1.0")
        .build()?;

    Ok(client)
}

async fn put_example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    // Simple put
    let stored = client
        .put("demo:greeting", "hello from rust", PutOpts::default())
        .await?;
    println!("Stored greeting: {}", stored);

    // JSON value that expires in ten minutes
    let settings = serde_json::to_vec(&json!({"theme": "dark", "beta": true}))?;
    let stored = client
        .put(
            "demo:settings",
            settings,
            PutOpts {
                expiration_ttl: Some(600),
                ..Default::default()
            },
        )
        .await?;
    println!("Stored settings: {}", stored);

    // Binary value with metadata
    let stored = client
        .put(
            "demo:pixel",
            vec![0x89u8, b'P', b'N', b'G'],
            PutOpts {
                metadata: Some(json!({"contentType": "image/png"})),
                ..Default::default()
            },
        )
        .await?;
    println!("Stored pixel with metadata: {}", stored);

    Ok(())
}

async fn get_example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    match client.get_text("demo:greeting").await? {
        Some(text) => println!("Greeting: {}", text),
        None => println!("Greeting not found"),
    }

    let settings: Option<serde_json::Value> = client.get_json("demo:settings").await?;
    println!("Settings: {:?}", settings);

    if let Some(stream) = client.get_stream("demo:pixel").await? {
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await?;
        let total: usize = chunks.iter().map(|chunk| chunk.len()).sum();
        println!("Pixel streamed in {} chunk(s), {} bytes", chunks.len(), total);
    }

    Ok(())
}

async fn list_example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let opts = ListOpts {
        prefix: Some("demo:".to_string()),
        limit: Some(10),
        ..Default::default()
    };

    match client.list(opts).await? {
        Some(page) => {
            for key in &page.keys {
                println!("  - {} (expires {:?})", key.name, key.expires_at());
            }
            println!("Complete: {}", page.list_complete);
        }
        None => println!("Listing was rejected"),
    }

    if let Some(all) = client.list_all(Some("demo:")).await? {
        println!("Total demo keys: {}", all.len());
    }

    Ok(())
}

async fn metadata_example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let entry = client
        .get_with_metadata("demo:pixel", Representation::ArrayBuffer)
        .await?;

    let size = entry
        .value
        .as_ref()
        .and_then(|value| value.as_bytes())
        .map(<[u8]>::len);
    println!("Pixel size: {:?}", size);
    println!("Pixel metadata: {}", entry.metadata);

    Ok(())
}

async fn delete_example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    for key in ["demo:greeting", "demo:settings", "demo:pixel"] {
        let deleted = client.delete(key).await?;
        println!("Deleted {}: {}", key, deleted);
    }

    match client.get_text("demo:greeting").await? {
        Some(_) => println!("Greeting still visible (deletes propagate eventually)"),
        None => println!("Greeting gone"),
    }

    Ok(())
}
