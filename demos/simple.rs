//! Example demonstrating the backoff guard against a real Redis.
//!
//! # Quick Start
//!
//! 1. Start Redis:
//!    ```bash
//!    docker run -p 6379:6379 redis:7-alpine
//!    ```
//!
//! 2. Run the example (from project root):
//!    ```bash
//!    RUST_LOG=guarded_redis=debug cargo run --example simple
//!    ```
//!
//! 3. Stop Redis while the example is running. After three failed increments
//!    in a row the guard opens and further calls fail instantly until the
//!    backoff has passed. Start Redis again and the counter resumes.
//!
//! Set `REDIS_HOST` / `REDIS_PORT` / `REDIS_KEY_PREFIX` to point elsewhere.

use guarded_redis::{Client, Error, GuardConfig, Options, RedisStore};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut options = match guarded_redis::infrastructure::config::options_from_env(
        guarded_redis::RwType::ReadWrite,
    ) {
        Ok(options) if !options.hosts.is_empty() => options,
        _ => Options::new(["127.0.0.1:6379"]),
    };
    if options.key_prefix.is_empty() {
        options.key_prefix = "demo:".into();
    }
    options.guard = GuardConfig {
        backoff: Duration::from_secs(2),
        max_consecutive_failures: 3,
        ..GuardConfig::default()
    };
    options.response_timeout = Some(Duration::from_millis(500));

    info!(hosts = ?options.hosts, prefix = %options.key_prefix, "connecting");
    let client = Client::<RedisStore>::connect(&options).await?;

    for tick in 0..60 {
        match client.incr("ticks").await {
            Ok(value) => info!(tick, value, "incremented"),
            Err(Error::GuardOpen) => warn!(tick, "guard open, skipped redis"),
            Err(e) => error!(tick, error = %e, "increment failed"),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let metrics = client.guard().metrics().snapshot();
    info!(
        admitted = metrics.calls_admitted,
        rejected = metrics.calls_rejected,
        opened = metrics.times_opened,
        "done"
    );

    Ok(())
}
