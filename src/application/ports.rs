//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use redis::{Cmd, FromRedisValue, RedisResult};
use std::fmt::Debug;
use std::future::Future;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the guard to work with time without depending on
/// the system clock. Infrastructure provides concrete implementations
/// (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Port for sending commands to a key-value store.
///
/// The client facade builds fully-prefixed `redis::Cmd` values; an executor only
/// transports them and decodes the reply. Infrastructure provides
/// `RedisStore` (standalone or cluster) and, for tests, `MockExecutor`.
pub trait CommandExecutor: Send + Sync + Debug {
    /// Handle returned by [`subscribe`](CommandExecutor::subscribe).
    type Subscription: Send;

    /// Execute a single command and decode its reply.
    fn execute<T>(&self, cmd: Cmd) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send;

    /// Send several commands in one round trip and decode the combined reply.
    fn execute_pipeline<T>(&self, cmds: Vec<Cmd>) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send;

    /// Open a subscription on the given (already prefixed) channels.
    fn subscribe(
        &self,
        channels: Vec<String>,
    ) -> impl Future<Output = RedisResult<Self::Subscription>> + Send;
}
