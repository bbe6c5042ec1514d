//! Integration tests against a live Redis.
//!
//! These tests require a Redis instance running at `127.0.0.1:6379`.
//! Tests are ignored by default - run with `cargo test --test live_redis -- --ignored`

use guarded_redis::{Client, ClientType, Options, RedisStore};
use std::time::Duration;

/// Check if Redis is available before running tests
async fn redis_available() -> bool {
    RedisStore::connect(&Options::new(["127.0.0.1:6379"]))
        .await
        .is_ok()
}

/// Create a client with a unique prefix per test
async fn create_test_client(test_name: &str) -> Client<RedisStore> {
    let options = Options {
        key_prefix: format!("test:{}:", test_name).into(),
        response_timeout: Some(Duration::from_secs(5)),
        ..Options::new(["127.0.0.1:6379"])
    };

    Client::connect(&options)
        .await
        .expect("Failed to connect to Redis")
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_ping() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at 127.0.0.1:6379");
        return;
    }

    let client = create_test_client("ping").await;
    assert_eq!(client.ping().await.unwrap(), "PONG");
    assert_eq!(client.executor().client_type(), ClientType::Normal);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_counters_and_prefix() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let client = create_test_client("counters").await;
    let raw = Client::new(RedisStore::connect(&Options::new(["127.0.0.1:6379"])).await.unwrap());
    client.del(&["hits"]).await.unwrap();

    assert_eq!(client.incr("hits").await.unwrap(), 1);
    assert_eq!(client.incr_by("hits", 9).await.unwrap(), 10);
    assert_eq!(client.decr_by("hits", 4).await.unwrap(), 6);

    let stored: Option<i64> = raw.get("test:counters:hits").await.unwrap();
    assert_eq!(stored, Some(6));
    client.del(&["hits"]).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_mget_by_pipeline() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let client = create_test_client("pipeline").await;
    for (key, value) in [("k1", 1), ("k2", 2), ("k3", 3)] {
        client
            .set(key, value, Some(Duration::from_secs(60)))
            .await
            .unwrap();
    }

    let values: Vec<String> = client.mget_by_pipeline(&["k1", "k2", "k3"]).await.unwrap();
    assert_eq!(values, vec!["1", "2", "3"]);
    client.del(&["k1", "k2", "k3"]).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_scan_stays_in_namespace() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let client = create_test_client("scan").await;
    client.set("a", 1, None).await.unwrap();
    client.set("b", 2, None).await.unwrap();

    let mut found = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, keys) = client.scan(cursor, None, Some(100)).await.unwrap();
        found.extend(
            keys.iter()
                .filter_map(|key| client.key_prefix().strip(key).map(str::to_string)),
        );
        if next == 0 {
            break;
        }
        cursor = next;
    }

    found.sort();
    assert_eq!(found, vec!["a", "b"]);
    client.del(&["a", "b"]).await.unwrap();
}

#[tokio::test]
#[ignore] // Slow: the connection manager retries before giving up
async fn test_unreachable_host_fails_to_connect() {
    let options = Options {
        connect_timeout: Some(Duration::from_millis(200)),
        ..Options::new(["127.0.0.1:1"])
    };
    assert!(Client::connect(&options).await.is_err());
}
