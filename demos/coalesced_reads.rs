//! Request coalescing: identical concurrent GETs share one network call.
//!
//! Run with: `cargo run --example coalesced_reads`

use refetch::{Client, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("refetch=debug,coalesced_reads=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    // All five land on the same canonical key (the query-pair order does not
    // matter), so at most one request is on the wire at a time; the debug
    // logs show the followers attaching to it.
    let results = tokio::join!(
        client.get::<serde_json::Value>("/comments?postId=1"),
        client.get::<serde_json::Value>("/comments?postId=1"),
        client.get::<serde_json::Value>("/comments?postId=1"),
        client.get::<serde_json::Value>("/comments?postId=1"),
        client.get::<serde_json::Value>("/comments?postId=1"),
    );

    let first = results.0?;
    println!(
        "five callers, one response: {} comments, {} attempt(s)",
        first.data.as_array().map(|a| a.len()).unwrap_or(0),
        first.attempts
    );

    // A different query is a different key and fetches independently.
    let other = client.get::<serde_json::Value>("/comments?postId=2").await?;
    println!(
        "different key fetched separately: {} comments",
        other.data.as_array().map(|a| a.len()).unwrap_or(0)
    );

    Ok(())
}
