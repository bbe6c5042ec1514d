//! Scripted command executor for testing.

use crate::application::ports::CommandExecutor;
use redis::{Arg, Cmd, FromRedisValue, RedisError, RedisResult, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Executor that records commands and replies from a script.
///
/// Replies are consumed in order; once the script is empty every command
/// gets `Value::Nil`. Clones share the same script and history.
///
/// # Examples
///
/// ```
/// use guarded_redis::infrastructure::mocks::MockExecutor;
/// use guarded_redis::{Client, KeyPrefix};
/// use redis::Value;
///
/// # async fn demo() -> guarded_redis::Result<()> {
/// let executor = MockExecutor::new();
/// executor.push_reply(Value::Int(1));
///
/// let client = Client::builder(executor.clone())
///     .with_key_prefix(KeyPrefix::new("app:"))
///     .build();
/// let n: i64 = client.incr("visits").await?;
///
/// assert_eq!(n, 1);
/// assert_eq!(executor.last_command(), Some(vec!["INCR".to_string(), "app:visits".to_string()]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<RedisResult<Value>>,
    commands: Vec<Vec<String>>,
    pipelines: Vec<Vec<Vec<String>>>,
    subscriptions: Vec<Vec<String>>,
}

impl MockExecutor {
    /// Create an executor with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .lock()
            .expect("MockExecutor mutex poisoned - a test thread panicked while holding the lock")
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, value: Value) {
        self.state().replies.push_back(Ok(value));
    }

    /// Queue an error reply.
    pub fn push_error(&self, error: RedisError) {
        self.state().replies.push_back(Err(error));
    }

    /// Queue a transport error of the given kind.
    pub fn push_io_error(&self, kind: io::ErrorKind) {
        self.push_error(RedisError::from(io::Error::new(kind, "mock transport failure")));
    }

    /// Every single command executed so far, rendered as strings.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state().commands.clone()
    }

    /// The most recent single command.
    pub fn last_command(&self) -> Option<Vec<String>> {
        self.state().commands.last().cloned()
    }

    /// Number of round trips (commands plus pipelines) made.
    pub fn round_trips(&self) -> usize {
        let state = self.state();
        state.commands.len() + state.pipelines.len()
    }

    /// Every pipeline executed so far.
    pub fn pipelines(&self) -> Vec<Vec<Vec<String>>> {
        self.state().pipelines.clone()
    }

    /// Channel lists passed to `subscribe`.
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.state().subscriptions.clone()
    }

    fn next_reply(&self) -> RedisResult<Value> {
        self.state().replies.pop_front().unwrap_or(Ok(Value::Nil))
    }
}

/// Render a command's arguments for assertions.
pub fn render_command(cmd: &Cmd) -> Vec<String> {
    cmd.args_iter()
        .map(|arg| match arg {
            Arg::Simple(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Arg::Cursor => "<cursor>".to_string(),
        })
        .collect()
}

impl CommandExecutor for MockExecutor {
    type Subscription = Vec<String>;

    fn execute<T>(&self, cmd: Cmd) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send,
    {
        self.state().commands.push(render_command(&cmd));
        let reply = self.next_reply();
        async move { reply.and_then(|value| T::from_redis_value(&value)) }
    }

    fn execute_pipeline<T>(&self, cmds: Vec<Cmd>) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send,
    {
        self.state()
            .pipelines
            .push(cmds.iter().map(render_command).collect());
        let reply = self.next_reply();
        async move { reply.and_then(|value| T::from_redis_value(&value)) }
    }

    fn subscribe(
        &self,
        channels: Vec<String>,
    ) -> impl Future<Output = RedisResult<Self::Subscription>> + Send {
        self.state().subscriptions.push(channels.clone());
        async move { Ok(channels) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_nil() {
        let executor = MockExecutor::new();
        executor.push_reply(Value::Int(7));
        executor.push_io_error(io::ErrorKind::ConnectionReset);

        let first: i64 = executor.execute(redis::cmd("GET").arg("a").clone()).await.unwrap();
        assert_eq!(first, 7);

        let second: RedisResult<i64> = executor.execute(redis::cmd("GET").arg("b").clone()).await;
        assert!(second.unwrap_err().is_io_error());

        let third: Option<String> = executor.execute(redis::cmd("GET").arg("c").clone()).await.unwrap();
        assert_eq!(third, None);

        assert_eq!(executor.round_trips(), 3);
        assert_eq!(executor.commands()[1], vec!["GET", "b"]);
    }

    #[tokio::test]
    async fn test_records_pipelines_and_subscriptions() {
        let executor = MockExecutor::new();
        let cmds = vec![redis::cmd("GET").arg("x").clone(), redis::cmd("GET").arg("y").clone()];
        let _: RedisResult<()> = executor.execute_pipeline(cmds).await;
        let subscription = executor.subscribe(vec!["news".to_string()]).await.unwrap();

        assert_eq!(executor.pipelines(), vec![vec![vec!["GET", "x"], vec!["GET", "y"]]]);
        assert_eq!(subscription, vec!["news"]);
        assert_eq!(executor.subscriptions().len(), 1);
    }
}
