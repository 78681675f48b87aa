//! Basic usage: a configured client, a GET, and a POST.
//!
//! Run with: `cargo run --example basic_call`

use refetch::{Client, Error, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Post {
    id: u64,
    title: String,
}

#[derive(Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("refetch=info,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .timeout(Duration::from_secs(30))
        .retry_policy(RetryPolicy::ExponentialBackoff {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
            jitter: true,
        })
        .default_header("User-Agent", "refetch-demo/0.1")?
        .build()?;

    let post = client.get::<Post>("/posts/1").await?;
    println!("fetched post {}: {}", post.data.id, post.data.title);
    println!("  status: {}", post.status);
    println!("  latency: {:?}", post.latency);
    println!("  attempts: {}", post.attempts);

    let new_post = NewPost {
        title: "hello".to_string(),
        body: "from refetch".to_string(),
        user_id: 1,
    };
    let created = client.post::<_, serde_json::Value>("/posts", &new_post).await?;
    println!("created: {}", created.raw_body);

    // A second GET to the same URL is conditional if the server sent an ETag,
    // and would coalesce with any identical GET still in flight.
    match client.get::<Post>("/posts/1").await {
        Ok(post) => println!("refetched post {}", post.data.id),
        Err(Error::Status { status, .. }) if status.as_u16() == 304 => {
            println!("not modified, reuse the cached copy")
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
