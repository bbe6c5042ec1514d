//! # guarded-redis
//!
//! Redis client that namespaces every key with a configurable prefix and
//! protects counters with a failure-triggered backoff guard.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guarded_redis::{Client, GuardConfig, Options, RedisStore};
//! use std::time::Duration;
//!
//! # async fn demo() -> guarded_redis::Result<()> {
//! let options = Options {
//!     key_prefix: "billing:".into(),
//!     guard: GuardConfig {
//!         backoff: Duration::from_secs(1),
//!         max_consecutive_failures: 3,
//!         ..GuardConfig::default()
//!     },
//!     ..Options::new(["127.0.0.1:6379"])
//! };
//!
//! let client = Client::<RedisStore>::connect(&options).await?;
//! client.set("invoice:42", "paid", None).await?;   // SET billing:invoice:42 paid
//! let seen = client.incr("invoices").await?;        // INCR billing:invoices (guarded)
//! # Ok(())
//! # }
//! ```
//!
//! Or let the deployment decide, reading `REDIS_*` variables and the mounted
//! `/etc/paas/redis.toml`:
//!
//! ```rust,no_run
//! # async fn demo() -> guarded_redis::Result<()> {
//! let client = guarded_redis::auto_config(guarded_redis::RwType::ReadWrite).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## The Backoff Guard
//!
//! Each client owns a [`BackoffGuard`]. Every guarded call asks it for
//! permission first and reports its outcome afterwards:
//!
//! - A qualifying failure (by default a transport failure: I/O error, timeout,
//!   dropped or refused connection) increments a consecutive-failure count.
//! - A success, or a failure that does not qualify, resets the count.
//! - When the count exceeds `max_consecutive_failures` the guard opens. Guarded
//!   calls then fail immediately with [`Error::GuardOpen`] without touching
//!   Redis.
//! - The first permission check at or after `backoff` has elapsed closes the
//!   guard again and lets that call through.
//!
//! With `max_consecutive_failures = 3` and `backoff = 1s`, four refused
//! connections in a row open the guard; calls in the next second are rejected;
//! the first call after that second reaches Redis again.
//!
//! The guard is not tied to Redis. [`BackoffGuard::run`] wraps any fallible
//! future whose error implements [`TransportFailure`]:
//!
//! ```rust
//! use guarded_redis::{BackoffGuard, GuardConfig};
//! use std::io;
//!
//! # async fn demo() {
//! let guard = BackoffGuard::new(GuardConfig::default());
//! let result = guard
//!     .run(|| async { Ok::<_, io::Error>("pong") })
//!     .await;
//! assert_eq!(result.ok(), Some("pong"));
//! # }
//! ```
//!
//! ## Key Prefixing
//!
//! Keys, multi-key lists, destination keys, pub/sub channels and `SCAN`
//! patterns are prefixed. Hash fields, set and sorted-set members, values and
//! `SSCAN`/`HSCAN`/`ZSCAN` patterns are not.
//!
//! ## Configuration
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `REDIS_TYPE` | `normal` or `cluster` | `normal` |
//! | `REDIS_HOST` | hosts, comma separated | none |
//! | `REDIS_PORT` | ports, paired with hosts | `6379` |
//! | `REDIS_DB_NAME` | database index | `0` |
//! | `REDIS_DB_PASSWORD` | password | none |
//! | `REDIS_KEY_PREFIX` | key namespace | empty |
//! | `REDIS_TIMEOUT` | connect/response timeout, seconds | none |
//! | `REDIS_BACKOFF` | guard backoff, seconds | `1` |
//! | `REDIS_MAX_FAILURES` | failures tolerated in a row | `3` |
//! | `REDIS_FAILURE_POLICY` | `transport` or `any` | `transport` |
//!
//! With `ENV_PREFIX=MYAPP` the variables are read as `MYAPP_REDIS_HOST` and so
//! on. [`RwType::ReadOnly`] reads the `_READER` variants (`REDIS_HOST_READER`).
//! The volume file is `$CONFIG_DIR/$CONFIG_NAME.toml`.
//!
//! ## Observability
//!
//! The guard logs through `tracing`: a `warn` event when it opens, `info`
//! when the backoff elapses and `debug` for each rejected call. Counters are
//! available through [`BackoffGuard::metrics`]:
//!
//! ```rust
//! # use guarded_redis::BackoffGuard;
//! let guard = BackoffGuard::default();
//! let snapshot = guard.metrics().snapshot();
//! println!("rejected {} of {} calls", snapshot.calls_rejected, snapshot.total_calls());
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod error;

// Re-export commonly used types for convenience
pub use domain::{
    classifier::{FailurePolicy, TransportFailure, UnknownPolicy},
    key::KeyPrefix,
};

pub use application::{
    client::{Aggregate, Client, ClientBuilder, ZRangeBy, ZStore},
    guard::{BackoffGuard, GuardConfig, GuardError, GuardState, SharedBackoffGuard},
    metrics::{GuardMetrics, GuardMetricsSnapshot},
    ports::{Clock, CommandExecutor},
};

pub use infrastructure::{
    auto_config::{auto_config, auto_config_from_env, auto_config_from_volume},
    clock::SystemClock,
    config::{ClientType, ConfigError, Options, RwType},
    redis_store::RedisStore,
};

pub use error::{Error, Result};
