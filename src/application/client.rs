//! Key-prefixing client facade.
//!
//! [`Client`] exposes the Redis command set the services use. Every key,
//! destination key and channel gets the configured [`KeyPrefix`]; fields,
//! members and values are passed through untouched. Counter commands
//! (`INCR`, `INCRBY`, `DECR`, `DECRBY`) run under the shared [`BackoffGuard`]
//! and fail fast with [`Error::GuardOpen`] while it is open.
//!
//! Commands are built here as `redis::Cmd` values and handed to a
//! [`CommandExecutor`], so the same facade drives a live connection or the
//! scripted executor used in tests.

use crate::application::guard::{BackoffGuard, GuardConfig, SharedBackoffGuard};
use crate::application::ports::{Clock, CommandExecutor};
use crate::domain::key::KeyPrefix;
use crate::error::Result;
use redis::{Cmd, FromRedisValue, ToRedisArgs};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How `ZINTERSTORE` / `ZUNIONSTORE` combine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// Options for sorted-set store commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZStore {
    /// Per-key score multipliers; empty means 1 for every key
    pub weights: Vec<f64>,
    pub aggregate: Option<Aggregate>,
}

/// Bounds for the `*BYSCORE` / `*BYLEX` range commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZRangeBy {
    pub min: String,
    pub max: String,
    /// `LIMIT` is sent when either `offset` or `count` is non-zero
    pub offset: i64,
    pub count: i64,
}

impl ZRangeBy {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            offset: 0,
            count: 0,
        }
    }

    pub fn limit(mut self, offset: i64, count: i64) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    fn write_limit(&self, cmd: &mut Cmd) {
        if self.offset != 0 || self.count != 0 {
            cmd.arg("LIMIT").arg(self.offset).arg(self.count);
        }
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder<X> {
    executor: X,
    prefix: KeyPrefix,
    guard_config: GuardConfig,
    clock: Option<Arc<dyn Clock>>,
    guard: Option<SharedBackoffGuard>,
}

impl<X: CommandExecutor> ClientBuilder<X> {
    /// Namespace for every key and channel.
    pub fn with_key_prefix(mut self, prefix: impl Into<KeyPrefix>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Settings for a new guard. Ignored when [`with_guard`](Self::with_guard) is used.
    pub fn with_guard_config(mut self, config: GuardConfig) -> Self {
        self.guard_config = config;
        self
    }

    /// Time source for a new guard.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing guard with other clients.
    pub fn with_guard(mut self, guard: SharedBackoffGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn build(self) -> Client<X> {
        let guard = match (self.guard, self.clock) {
            (Some(guard), _) => guard,
            (None, Some(clock)) => Arc::new(BackoffGuard::with_clock(self.guard_config, clock)),
            (None, None) => Arc::new(BackoffGuard::new(self.guard_config)),
        };

        Client {
            executor: self.executor,
            prefix: self.prefix,
            guard,
        }
    }
}

/// Redis client that namespaces keys and guards counters.
#[derive(Debug, Clone)]
pub struct Client<X> {
    executor: X,
    prefix: KeyPrefix,
    guard: SharedBackoffGuard,
}

impl<X: CommandExecutor> Client<X> {
    /// Start building a client around `executor`.
    pub fn builder(executor: X) -> ClientBuilder<X> {
        ClientBuilder {
            executor,
            prefix: KeyPrefix::default(),
            guard_config: GuardConfig::default(),
            clock: None,
            guard: None,
        }
    }

    /// Client with no prefix and a default guard.
    pub fn new(executor: X) -> Self {
        Self::builder(executor).build()
    }

    pub fn key_prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    pub fn guard(&self) -> &SharedBackoffGuard {
        &self.guard
    }

    /// The underlying executor.
    pub fn executor(&self) -> &X {
        &self.executor
    }

    fn key(&self, key: &str) -> String {
        self.prefix.apply(key)
    }

    fn keys<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        self.prefix.apply_all(keys)
    }

    /// `name` with the prefixed key as first argument.
    fn keyed(&self, name: &str, key: &str) -> Cmd {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.key(key));
        cmd
    }

    /// `name` with every prefixed key as arguments.
    fn multi_keyed<K: AsRef<str>>(&self, name: &str, keys: &[K]) -> Cmd {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.keys(keys));
        cmd
    }

    async fn query<T>(&self, cmd: Cmd) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        Ok(self.executor.execute(cmd).await?)
    }

    async fn guarded<T>(&self, cmd: Cmd) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        Ok(self.guard.run(|| self.executor.execute(cmd)).await?)
    }

    // Pinger

    pub async fn ping(&self) -> Result<String> {
        self.query(redis::cmd("PING")).await
    }

    // Counters (guarded)

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.guarded(self.keyed("INCR", key)).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut cmd = self.keyed("INCRBY", key);
        cmd.arg(delta);
        self.guarded(cmd).await
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.guarded(self.keyed("DECR", key)).await
    }

    pub async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut cmd = self.keyed("DECRBY", key);
        cmd.arg(delta);
        self.guarded(cmd).await
    }

    // Expiry

    /// Sub-second durations are rounded up to one second.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut cmd = self.keyed("EXPIRE", key);
        cmd.arg(whole_seconds(ttl));
        self.query(cmd).await
    }

    pub async fn expire_at(&self, key: &str, at: SystemTime) -> Result<bool> {
        let mut cmd = self.keyed("EXPIREAT", key);
        cmd.arg(since_epoch(at).as_secs());
        self.query(cmd).await
    }

    pub async fn persist(&self, key: &str) -> Result<bool> {
        self.query(self.keyed("PERSIST", key)).await
    }

    pub async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut cmd = self.keyed("PEXPIRE", key);
        cmd.arg(whole_millis(ttl));
        self.query(cmd).await
    }

    pub async fn pexpire_at(&self, key: &str, at: SystemTime) -> Result<bool> {
        let mut cmd = self.keyed("PEXPIREAT", key);
        cmd.arg(since_epoch(at).as_millis() as u64);
        self.query(cmd).await
    }

    /// Remaining time to live in seconds; `-1` without expiry, `-2` if missing.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("TTL", key)).await
    }

    /// Remaining time to live in milliseconds; `-1` without expiry, `-2` if missing.
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("PTTL", key)).await
    }

    // Getters

    /// Number of the given keys that exist.
    pub async fn exists<K: AsRef<str>>(&self, keys: &[K]) -> Result<i64> {
        self.query(self.multi_keyed("EXISTS", keys)).await
    }

    pub async fn get<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("GET", key)).await
    }

    pub async fn get_bit(&self, key: &str, offset: usize) -> Result<bool> {
        let mut cmd = self.keyed("GETBIT", key);
        cmd.arg(offset);
        self.query(cmd).await
    }

    pub async fn get_range<RV>(&self, key: &str, start: isize, end: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("GETRANGE", key);
        cmd.arg(start).arg(end);
        self.query(cmd).await
    }

    pub async fn get_set<V, RV>(&self, key: &str, value: V) -> Result<RV>
    where
        V: ToRedisArgs + Send + Sync,
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("GETSET", key);
        cmd.arg(value);
        self.query(cmd).await
    }

    pub async fn mget<K, RV>(&self, keys: &[K]) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        self.query(self.multi_keyed("MGET", keys)).await
    }

    pub async fn dump<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("DUMP", key)).await
    }

    /// One `GET` per key, sent as a single pipeline.
    ///
    /// On a cluster all keys must share one hash slot; use hash tags such as
    /// `{user:1}:name` to keep them together.
    pub async fn mget_by_pipeline<K, RV>(&self, keys: &[K]) -> Result<Vec<RV>>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let cmds = keys
            .iter()
            .map(|key| self.keyed("GET", key.as_ref()))
            .collect();
        Ok(self.executor.execute_pipeline(cmds).await?)
    }

    // Setters

    /// `SET`, with an expiry when `ttl` is a non-zero duration.
    ///
    /// Whole seconds are sent as `EX`, anything finer as `PX`.
    pub async fn set<V>(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("SET", key);
        cmd.arg(value);
        match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) if ttl.subsec_nanos() == 0 => {
                cmd.arg("EX").arg(ttl.as_secs());
            }
            Some(ttl) => {
                cmd.arg("PX").arg(whole_millis(ttl));
            }
            None => {}
        }
        self.query(cmd).await
    }

    pub async fn append<V>(&self, key: &str, value: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("APPEND", key);
        cmd.arg(value);
        self.query(cmd).await
    }

    pub async fn del<K: AsRef<str>>(&self, keys: &[K]) -> Result<i64> {
        self.query(self.multi_keyed("DEL", keys)).await
    }

    pub async fn unlink<K: AsRef<str>>(&self, keys: &[K]) -> Result<i64> {
        self.query(self.multi_keyed("UNLINK", keys)).await
    }

    // Hashes

    pub async fn hexists<F>(&self, key: &str, field: F) -> Result<bool>
    where
        F: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HEXISTS", key);
        cmd.arg(field);
        self.query(cmd).await
    }

    pub async fn hget<F, RV>(&self, key: &str, field: F) -> Result<RV>
    where
        F: ToRedisArgs + Send + Sync,
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("HGET", key);
        cmd.arg(field);
        self.query(cmd).await
    }

    pub async fn hgetall<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("HGETALL", key)).await
    }

    pub async fn hincr_by<F>(&self, key: &str, field: F, delta: i64) -> Result<i64>
    where
        F: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HINCRBY", key);
        cmd.arg(field).arg(delta);
        self.query(cmd).await
    }

    pub async fn hincr_by_float<F>(&self, key: &str, field: F, delta: f64) -> Result<f64>
    where
        F: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HINCRBYFLOAT", key);
        cmd.arg(field).arg(delta);
        self.query(cmd).await
    }

    pub async fn hkeys<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("HKEYS", key)).await
    }

    pub async fn hlen(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("HLEN", key)).await
    }

    pub async fn hmget<F, RV>(&self, key: &str, fields: F) -> Result<RV>
    where
        F: ToRedisArgs + Send + Sync,
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("HMGET", key);
        cmd.arg(fields);
        self.query(cmd).await
    }

    pub async fn hset_multiple<F, V>(&self, key: &str, items: &[(F, V)]) -> Result<()>
    where
        F: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HMSET", key);
        cmd.arg(items);
        self.query(cmd).await
    }

    /// Returns `true` if the field is new.
    pub async fn hset<F, V>(&self, key: &str, field: F, value: V) -> Result<bool>
    where
        F: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HSET", key);
        cmd.arg(field).arg(value);
        self.query(cmd).await
    }

    pub async fn hsetnx<F, V>(&self, key: &str, field: F, value: V) -> Result<bool>
    where
        F: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HSETNX", key);
        cmd.arg(field).arg(value);
        self.query(cmd).await
    }

    pub async fn hvals<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("HVALS", key)).await
    }

    pub async fn hdel<F>(&self, key: &str, fields: F) -> Result<i64>
    where
        F: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("HDEL", key);
        cmd.arg(fields);
        self.query(cmd).await
    }

    // Lists

    pub async fn lindex<RV>(&self, key: &str, index: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("LINDEX", key);
        cmd.arg(index);
        self.query(cmd).await
    }

    async fn linsert<P, V>(&self, key: &str, position: &str, pivot: P, value: V) -> Result<i64>
    where
        P: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("LINSERT", key);
        cmd.arg(position).arg(pivot).arg(value);
        self.query(cmd).await
    }

    pub async fn linsert_before<P, V>(&self, key: &str, pivot: P, value: V) -> Result<i64>
    where
        P: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        self.linsert(key, "BEFORE", pivot, value).await
    }

    pub async fn linsert_after<P, V>(&self, key: &str, pivot: P, value: V) -> Result<i64>
    where
        P: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        self.linsert(key, "AFTER", pivot, value).await
    }

    pub async fn llen(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("LLEN", key)).await
    }

    pub async fn lpop<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("LPOP", key)).await
    }

    /// Push one value, or every element of a slice or `Vec`.
    pub async fn lpush<V>(&self, key: &str, values: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("LPUSH", key);
        cmd.arg(values);
        self.query(cmd).await
    }

    pub async fn lpushx<V>(&self, key: &str, value: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("LPUSHX", key);
        cmd.arg(value);
        self.query(cmd).await
    }

    pub async fn lrange<RV>(&self, key: &str, start: isize, stop: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("LRANGE", key);
        cmd.arg(start).arg(stop);
        self.query(cmd).await
    }

    pub async fn lrem<V>(&self, key: &str, count: isize, value: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("LREM", key);
        cmd.arg(count).arg(value);
        self.query(cmd).await
    }

    pub async fn lset<V>(&self, key: &str, index: isize, value: V) -> Result<()>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("LSET", key);
        cmd.arg(index).arg(value);
        self.query(cmd).await
    }

    pub async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut cmd = self.keyed("LTRIM", key);
        cmd.arg(start).arg(stop);
        self.query(cmd).await
    }

    pub async fn rpop<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("RPOP", key)).await
    }

    pub async fn rpoplpush<RV>(&self, source: &str, destination: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("RPOPLPUSH", source);
        cmd.arg(self.key(destination));
        self.query(cmd).await
    }

    pub async fn rpush<V>(&self, key: &str, values: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("RPUSH", key);
        cmd.arg(values);
        self.query(cmd).await
    }

    pub async fn rpushx<V>(&self, key: &str, value: V) -> Result<i64>
    where
        V: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("RPUSHX", key);
        cmd.arg(value);
        self.query(cmd).await
    }

    // Sets

    pub async fn sadd<M>(&self, key: &str, members: M) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("SADD", key);
        cmd.arg(members);
        self.query(cmd).await
    }

    pub async fn scard(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("SCARD", key)).await
    }

    pub async fn sdiff<K, RV>(&self, keys: &[K]) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        self.query(self.multi_keyed("SDIFF", keys)).await
    }

    pub async fn sdiffstore<K: AsRef<str>>(&self, destination: &str, keys: &[K]) -> Result<i64> {
        self.query(self.stored("SDIFFSTORE", destination, keys)).await
    }

    pub async fn sinter<K, RV>(&self, keys: &[K]) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        self.query(self.multi_keyed("SINTER", keys)).await
    }

    pub async fn sinterstore<K: AsRef<str>>(&self, destination: &str, keys: &[K]) -> Result<i64> {
        self.query(self.stored("SINTERSTORE", destination, keys)).await
    }

    pub async fn sismember<M>(&self, key: &str, member: M) -> Result<bool>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("SISMEMBER", key);
        cmd.arg(member);
        self.query(cmd).await
    }

    pub async fn smembers<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("SMEMBERS", key)).await
    }

    pub async fn smove<M>(&self, source: &str, destination: &str, member: M) -> Result<bool>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("SMOVE", source);
        cmd.arg(self.key(destination)).arg(member);
        self.query(cmd).await
    }

    pub async fn spop<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("SPOP", key)).await
    }

    pub async fn spop_n<RV>(&self, key: &str, count: usize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("SPOP", key);
        cmd.arg(count);
        self.query(cmd).await
    }

    pub async fn srandmember<RV>(&self, key: &str) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.keyed("SRANDMEMBER", key)).await
    }

    /// A negative `count` may return the same member several times.
    pub async fn srandmember_n<RV>(&self, key: &str, count: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("SRANDMEMBER", key);
        cmd.arg(count);
        self.query(cmd).await
    }

    pub async fn srem<M>(&self, key: &str, members: M) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("SREM", key);
        cmd.arg(members);
        self.query(cmd).await
    }

    pub async fn sunion<K, RV>(&self, keys: &[K]) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        self.query(self.multi_keyed("SUNION", keys)).await
    }

    pub async fn sunionstore<K: AsRef<str>>(&self, destination: &str, keys: &[K]) -> Result<i64> {
        self.query(self.stored("SUNIONSTORE", destination, keys)).await
    }

    /// `name destination key...`, all prefixed.
    fn stored<K: AsRef<str>>(&self, name: &str, destination: &str, keys: &[K]) -> Cmd {
        let mut cmd = self.keyed(name, destination);
        cmd.arg(self.keys(keys));
        cmd
    }

    // Sorted sets

    pub async fn zadd<M>(&self, key: &str, score: f64, member: M) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZADD", key);
        cmd.arg(score).arg(member);
        self.query(cmd).await
    }

    pub async fn zadd_multiple<M>(&self, key: &str, items: &[(f64, M)]) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZADD", key);
        cmd.arg(items);
        self.query(cmd).await
    }

    pub async fn zcard(&self, key: &str) -> Result<i64> {
        self.query(self.keyed("ZCARD", key)).await
    }

    /// `min` and `max` accept Redis score syntax such as `"(1"` or `"-inf"`.
    pub async fn zcount(&self, key: &str, min: &str, max: &str) -> Result<i64> {
        let mut cmd = self.keyed("ZCOUNT", key);
        cmd.arg(min).arg(max);
        self.query(cmd).await
    }

    pub async fn zincr_by<M>(&self, key: &str, delta: f64, member: M) -> Result<f64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZINCRBY", key);
        cmd.arg(delta).arg(member);
        self.query(cmd).await
    }

    pub async fn zinterstore<K: AsRef<str>>(
        &self,
        destination: &str,
        keys: &[K],
        store: &ZStore,
    ) -> Result<i64> {
        self.query(self.zstore("ZINTERSTORE", destination, keys, store))
            .await
    }

    pub async fn zunionstore<K: AsRef<str>>(
        &self,
        destination: &str,
        keys: &[K],
        store: &ZStore,
    ) -> Result<i64> {
        self.query(self.zstore("ZUNIONSTORE", destination, keys, store))
            .await
    }

    fn zstore<K: AsRef<str>>(&self, name: &str, destination: &str, keys: &[K], store: &ZStore) -> Cmd {
        let mut cmd = self.keyed(name, destination);
        cmd.arg(keys.len()).arg(self.keys(keys));
        if !store.weights.is_empty() {
            cmd.arg("WEIGHTS").arg(&store.weights);
        }
        if let Some(aggregate) = store.aggregate {
            cmd.arg("AGGREGATE").arg(aggregate.as_str());
        }
        cmd
    }

    pub async fn zrange<RV>(&self, key: &str, start: isize, stop: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZRANGE", key);
        cmd.arg(start).arg(stop);
        self.query(cmd).await
    }

    pub async fn zrange_withscores<RV>(&self, key: &str, start: isize, stop: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZRANGE", key);
        cmd.arg(start).arg(stop).arg("WITHSCORES");
        self.query(cmd).await
    }

    pub async fn zrangebyscore<RV>(&self, key: &str, range: &ZRangeBy) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZRANGEBYSCORE", key);
        cmd.arg(&range.min).arg(&range.max);
        range.write_limit(&mut cmd);
        self.query(cmd).await
    }

    pub async fn zrangebylex<RV>(&self, key: &str, range: &ZRangeBy) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZRANGEBYLEX", key);
        cmd.arg(&range.min).arg(&range.max);
        range.write_limit(&mut cmd);
        self.query(cmd).await
    }

    pub async fn zrank<M>(&self, key: &str, member: M) -> Result<Option<i64>>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZRANK", key);
        cmd.arg(member);
        self.query(cmd).await
    }

    pub async fn zrem<M>(&self, key: &str, members: M) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZREM", key);
        cmd.arg(members);
        self.query(cmd).await
    }

    pub async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<i64> {
        let mut cmd = self.keyed("ZREMRANGEBYRANK", key);
        cmd.arg(start).arg(stop);
        self.query(cmd).await
    }

    pub async fn zremrangebyscore(&self, key: &str, min: &str, max: &str) -> Result<i64> {
        let mut cmd = self.keyed("ZREMRANGEBYSCORE", key);
        cmd.arg(min).arg(max);
        self.query(cmd).await
    }

    pub async fn zremrangebylex(&self, key: &str, min: &str, max: &str) -> Result<i64> {
        let mut cmd = self.keyed("ZREMRANGEBYLEX", key);
        cmd.arg(min).arg(max);
        self.query(cmd).await
    }

    pub async fn zrevrange<RV>(&self, key: &str, start: isize, stop: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZREVRANGE", key);
        cmd.arg(start).arg(stop);
        self.query(cmd).await
    }

    pub async fn zrevrange_withscores<RV>(&self, key: &str, start: isize, stop: isize) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZREVRANGE", key);
        cmd.arg(start).arg(stop).arg("WITHSCORES");
        self.query(cmd).await
    }

    /// Sends `range.max` before `range.min`, as the command expects.
    pub async fn zrevrangebyscore<RV>(&self, key: &str, range: &ZRangeBy) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("ZREVRANGEBYSCORE", key);
        cmd.arg(&range.max).arg(&range.min);
        range.write_limit(&mut cmd);
        self.query(cmd).await
    }

    pub async fn zrevrank<M>(&self, key: &str, member: M) -> Result<Option<i64>>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZREVRANK", key);
        cmd.arg(member);
        self.query(cmd).await
    }

    pub async fn zscore<M>(&self, key: &str, member: M) -> Result<Option<f64>>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = self.keyed("ZSCORE", key);
        cmd.arg(member);
        self.query(cmd).await
    }

    // Blocking
    //
    // A response timeout on the connection must be longer than `timeout`,
    // otherwise the wait is cut short by the transport.

    /// `None` when `timeout` expires. A zero timeout blocks indefinitely.
    pub async fn blpop<K, RV>(&self, keys: &[K], timeout: Duration) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.multi_keyed("BLPOP", keys);
        cmd.arg(whole_seconds(timeout));
        self.query(cmd).await
    }

    pub async fn brpop<K, RV>(&self, keys: &[K], timeout: Duration) -> Result<RV>
    where
        K: AsRef<str>,
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.multi_keyed("BRPOP", keys);
        cmd.arg(whole_seconds(timeout));
        self.query(cmd).await
    }

    pub async fn brpoplpush<RV>(&self, source: &str, destination: &str, timeout: Duration) -> Result<RV>
    where
        RV: FromRedisValue + Send,
    {
        let mut cmd = self.keyed("BRPOPLPUSH", source);
        cmd.arg(self.key(destination)).arg(whole_seconds(timeout));
        self.query(cmd).await
    }

    // Scanning

    pub async fn key_type(&self, key: &str) -> Result<String> {
        self.query(self.keyed("TYPE", key)).await
    }

    /// One `SCAN` step over this client's namespace.
    ///
    /// The match pattern is prefixed; without one every key under the prefix
    /// matches. Returned keys keep their prefix, use
    /// [`KeyPrefix::strip`] to remove it.
    pub async fn scan(
        &self,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, Vec<String>)> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor);
        match pattern {
            Some(pattern) => {
                cmd.arg("MATCH").arg(self.key(pattern));
            }
            None if !self.prefix.is_empty() => {
                cmd.arg("MATCH").arg(self.key("*"));
            }
            None => {}
        }
        write_count(&mut cmd, count);
        self.query(cmd).await
    }

    /// `SSCAN` step. `pattern` matches members and is not prefixed.
    pub async fn sscan<RV>(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, RV)>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.member_scan("SSCAN", key, cursor, pattern, count))
            .await
    }

    /// `HSCAN` step. Replies alternate field and value.
    pub async fn hscan<RV>(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, RV)>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.member_scan("HSCAN", key, cursor, pattern, count))
            .await
    }

    /// `ZSCAN` step. Replies alternate member and score.
    pub async fn zscan<RV>(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, RV)>
    where
        RV: FromRedisValue + Send,
    {
        self.query(self.member_scan("ZSCAN", key, cursor, pattern, count))
            .await
    }

    fn member_scan(
        &self,
        name: &str,
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Cmd {
        let mut cmd = self.keyed(name, key);
        cmd.arg(cursor);
        if let Some(pattern) = pattern {
            cmd.arg("MATCH").arg(pattern);
        }
        write_count(&mut cmd, count);
        cmd
    }

    // Pub/sub

    /// Number of subscribers that received the message.
    pub async fn publish<M>(&self, channel: &str, message: M) -> Result<i64>
    where
        M: ToRedisArgs + Send + Sync,
    {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(self.key(channel)).arg(message);
        self.query(cmd).await
    }

    /// Subscribe to the prefixed channels.
    pub async fn subscribe<K: AsRef<str>>(&self, channels: &[K]) -> Result<X::Subscription> {
        Ok(self.executor.subscribe(self.keys(channels)).await?)
    }
}

fn write_count(cmd: &mut Cmd, count: Option<usize>) {
    if let Some(count) = count {
        cmd.arg("COUNT").arg(count);
    }
}

/// Seconds for commands that only take whole seconds. Non-zero durations
/// never round down to zero, which Redis reads as "no timeout".
fn whole_seconds(duration: Duration) -> u64 {
    match duration.as_secs() {
        0 if !duration.is_zero() => 1,
        secs => secs,
    }
}

/// Milliseconds for `PX` and `PEXPIRE`. Non-zero durations never round down
/// to zero, which Redis rejects for `SET` and treats as "expire now".
fn whole_millis(duration: Duration) -> u64 {
    match u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) {
        0 if !duration.is_zero() => 1,
        millis => millis,
    }
}

fn since_epoch(at: SystemTime) -> Duration {
    at.duration_since(UNIX_EPOCH).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::infrastructure::mocks::{MockClock, MockExecutor};
    use redis::Value;
    use std::io;
    use std::time::Instant;

    fn client(prefix: &str) -> (Client<MockExecutor>, MockExecutor) {
        let executor = MockExecutor::new();
        let client = Client::builder(executor.clone())
            .with_key_prefix(prefix)
            .build();
        (client, executor)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn scan_reply(cursor: &str, items: &[&str]) -> Value {
        Value::Array(vec![
            Value::BulkString(cursor.as_bytes().to_vec()),
            Value::Array(
                items
                    .iter()
                    .map(|item| Value::BulkString(item.as_bytes().to_vec()))
                    .collect(),
            ),
        ])
    }

    // The mock answers Nil by default; these tests only look at the commands sent.

    #[tokio::test]
    async fn test_single_key_commands_are_prefixed() {
        let (client, executor) = client("svc:");

        let _ = client.get::<Option<String>>("user").await;
        let _ = client.set("user", "bob", None).await;
        let _ = client.hset("profile", "name", "bob").await;
        let _ = client.lpush("queue", vec!["a", "b"]).await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&["GET", "svc:user"]),
                args(&["SET", "svc:user", "bob"]),
                args(&["HSET", "svc:profile", "name", "bob"]),
                args(&["LPUSH", "svc:queue", "a", "b"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_prefix_leaves_keys_alone() {
        let (client, executor) = client("");
        let value: Option<String> = client.get("user").await.unwrap();
        assert_eq!(value, None);
        assert_eq!(executor.last_command(), Some(args(&["GET", "user"])));
    }

    #[tokio::test]
    async fn test_multi_key_and_destination_prefixing() {
        let (client, executor) = client("p:");

        let _ = client.del(&["a", "b"]).await;
        let _ = client.sinterstore("dst", &["s1", "s2"]).await;
        let _ = client.rpoplpush::<Option<String>>("src", "dst").await;
        let _ = client.smove("src", "dst", "m").await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&["DEL", "p:a", "p:b"]),
                args(&["SINTERSTORE", "p:dst", "p:s1", "p:s2"]),
                args(&["RPOPLPUSH", "p:src", "p:dst"]),
                args(&["SMOVE", "p:src", "p:dst", "m"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_fields_and_members_are_not_prefixed() {
        let (client, executor) = client("p:");

        let _ = client.hdel("h", vec!["f1", "f2"]).await;
        let _ = client.zadd("z", 1.5, "member").await;
        let _ = client.sismember("s", "member").await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&["HDEL", "p:h", "f1", "f2"]),
                args(&["ZADD", "p:z", "1.5", "member"]),
                args(&["SISMEMBER", "p:s", "member"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_expiration_units() {
        let (client, executor) = client("");

        client.set("k", 1, Some(Duration::from_secs(10))).await.unwrap();
        client.set("k", 1, Some(Duration::from_millis(1500))).await.unwrap();
        client.set("k", 1, Some(Duration::ZERO)).await.unwrap();
        client.set("k", 1, Some(Duration::from_micros(500))).await.unwrap();
        let _ = client.pexpire("k", Duration::from_micros(500)).await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&["SET", "k", "1", "EX", "10"]),
                args(&["SET", "k", "1", "PX", "1500"]),
                args(&["SET", "k", "1"]),
                args(&["SET", "k", "1", "PX", "1"]),
                args(&["PEXPIRE", "k", "1"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_expiry_commands() {
        let (client, executor) = client("p:");
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let _ = client.expire("k", Duration::from_millis(200)).await;
        let _ = client.expire_at("k", at).await;
        let _ = client.pexpire_at("k", at).await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&["EXPIRE", "p:k", "1"]),
                args(&["EXPIREAT", "p:k", "1700000000"]),
                args(&["PEXPIREAT", "p:k", "1700000000000"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_prefixes_pattern() {
        let (client, executor) = client("p:");
        executor.push_reply(scan_reply("0", &["p:user:1"]));
        executor.push_reply(scan_reply("0", &[]));

        let (cursor, keys) = client.scan(0, Some("user:*"), Some(100)).await.unwrap();
        client.scan(0, None, None).await.unwrap();

        assert_eq!(cursor, 0);
        assert_eq!(keys, vec!["p:user:1"]);
        assert_eq!(client.key_prefix().strip(&keys[0]), Some("user:1"));
        assert_eq!(
            executor.commands(),
            vec![
                args(&["SCAN", "0", "MATCH", "p:user:*", "COUNT", "100"]),
                args(&["SCAN", "0", "MATCH", "p:*"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_without_prefix_or_pattern() {
        let (client, executor) = client("");
        executor.push_reply(scan_reply("12", &["a"]));

        let (cursor, _) = client.scan(0, None, None).await.unwrap();

        assert_eq!(cursor, 12);
        assert_eq!(executor.last_command(), Some(args(&["SCAN", "0"])));
    }

    #[tokio::test]
    async fn test_member_scan_pattern_is_not_prefixed() {
        let (client, executor) = client("p:");
        executor.push_reply(scan_reply("0", &[]));

        let (_, members): (u64, Vec<String>) =
            client.sscan("s", 7, Some("a*"), None).await.unwrap();

        assert!(members.is_empty());
        assert_eq!(executor.last_command(), Some(args(&["SSCAN", "p:s", "7", "MATCH", "a*"])));
    }

    #[tokio::test]
    async fn test_sorted_set_store_and_ranges() {
        let (client, executor) = client("p:");
        let store = ZStore {
            weights: vec![2.5, 0.5],
            aggregate: Some(Aggregate::Max),
        };

        let _ = client.zunionstore("out", &["a", "b"], &store).await;
        let _ = client
            .zrevrangebyscore::<Vec<String>>("z", &ZRangeBy::new("0", "+inf").limit(0, 10))
            .await;
        let _ = client
            .zrangebylex::<Vec<String>>("z", &ZRangeBy::new("[a", "(c"))
            .await;

        assert_eq!(
            executor.commands(),
            vec![
                args(&[
                    "ZUNIONSTORE", "p:out", "2", "p:a", "p:b", "WEIGHTS", "2.5", "0.5", "AGGREGATE",
                    "MAX",
                ]),
                args(&["ZREVRANGEBYSCORE", "p:z", "+inf", "0", "LIMIT", "0", "10"]),
                args(&["ZRANGEBYLEX", "p:z", "[a", "(c"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_blocking_pop_prefixes_keys() {
        let (client, executor) = client("p:");
        let popped: Option<(String, String)> = client
            .blpop(&["jobs", "retries"], Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(popped, None);
        assert_eq!(
            executor.last_command(),
            Some(args(&["BLPOP", "p:jobs", "p:retries", "5"]))
        );
    }

    #[tokio::test]
    async fn test_mget_by_pipeline() {
        let (client, executor) = client("p:");
        executor.push_reply(Value::Array(vec![
            Value::BulkString(b"1".to_vec()),
            Value::Nil,
        ]));

        let values: Vec<Option<String>> = client.mget_by_pipeline(&["a", "b"]).await.unwrap();

        assert_eq!(values, vec![Some("1".to_string()), None]);
        assert_eq!(
            executor.pipelines(),
            vec![vec![args(&["GET", "p:a"]), args(&["GET", "p:b"])]]
        );
        assert_eq!(executor.round_trips(), 1);
    }

    #[tokio::test]
    async fn test_mget_by_pipeline_without_keys() {
        let (client, executor) = client("p:");
        let values: Vec<Option<String>> = client.mget_by_pipeline::<&str, _>(&[]).await.unwrap();
        assert!(values.is_empty());
        assert_eq!(executor.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_pubsub_channels_are_prefixed() {
        let (client, executor) = client("p:");
        executor.push_reply(Value::Int(2));

        let receivers = client.publish("news", "hello").await.unwrap();
        let subscription = client.subscribe(&["news", "alerts"]).await.unwrap();

        assert_eq!(receivers, 2);
        assert_eq!(executor.last_command(), Some(args(&["PUBLISH", "p:news", "hello"])));
        assert_eq!(subscription, vec!["p:news", "p:alerts"]);
    }

    #[tokio::test]
    async fn test_counters_are_guarded() {
        let executor = MockExecutor::new();
        let clock = MockClock::new(Instant::now());
        let client = Client::builder(executor.clone())
            .with_guard_config(GuardConfig {
                max_consecutive_failures: 1,
                ..GuardConfig::default()
            })
            .with_clock(Arc::new(clock.clone()))
            .build();

        executor.push_io_error(io::ErrorKind::ConnectionRefused);
        executor.push_io_error(io::ErrorKind::ConnectionRefused);

        assert!(matches!(client.incr("n").await, Err(Error::Redis(_))));
        assert!(matches!(client.decr_by("n", 2).await, Err(Error::Redis(_))));
        assert!(client.incr_by("n", 5).await.unwrap_err().is_guard_open());
        assert!(client.decr("n").await.unwrap_err().is_guard_open());
        assert_eq!(executor.round_trips(), 2);

        // Unguarded commands still reach the store
        let _: Option<String> = client.get("n").await.unwrap();
        assert_eq!(executor.round_trips(), 3);

        clock.advance(Duration::from_secs(1));
        executor.push_reply(Value::Int(6));
        assert_eq!(client.incr_by("n", 5).await.unwrap(), 6);
        assert_eq!(executor.last_command(), Some(args(&["INCRBY", "n", "5"])));
    }

    #[tokio::test]
    async fn test_application_errors_do_not_open_guard() {
        let (client, executor) = client("");
        for _ in 0..10 {
            executor.push_error(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "WRONGTYPE",
            )));
        }

        for _ in 0..10 {
            assert!(matches!(client.incr("n").await, Err(Error::Redis(_))));
        }
        assert!(!client.guard().is_open());
    }

    #[tokio::test]
    async fn test_shared_guard() {
        let guard = Arc::new(BackoffGuard::new(GuardConfig {
            max_consecutive_failures: 0,
            backoff: Duration::from_secs(60),
            ..GuardConfig::default()
        }));
        let first = MockExecutor::new();
        let second = MockExecutor::new();
        let a = Client::builder(first.clone()).with_guard(Arc::clone(&guard)).build();
        let b = Client::builder(second.clone()).with_guard(guard).build();

        first.push_io_error(io::ErrorKind::TimedOut);
        assert!(a.incr("n").await.is_err());
        assert!(b.incr("n").await.unwrap_err().is_guard_open());
        assert_eq!(second.round_trips(), 0);
    }

    #[test]
    fn test_whole_seconds() {
        assert_eq!(whole_seconds(Duration::ZERO), 0);
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(2500)), 2);
    }

    #[test]
    fn test_whole_millis() {
        assert_eq!(whole_millis(Duration::ZERO), 0);
        assert_eq!(whole_millis(Duration::from_nanos(1)), 1);
        assert_eq!(whole_millis(Duration::from_micros(2500)), 2);
    }
}
