//! Redis-backed command executor.
//!
//! Connects either to a single server through `redis::aio::ConnectionManager`
//! (multiplexed, reconnects on its own) or to a Redis Cluster through
//! `redis::cluster_async::ClusterConnection`.
//!
//! ## Limitations
//!
//! - Pub/sub is only available on standalone connections.
//! - In cluster mode a pipeline must only touch keys of one hash slot.
//! - `read_only` only has an effect on clusters, where reads go to replicas.

use crate::application::ports::CommandExecutor;
use crate::error::Error;
use crate::infrastructure::config::{ClientType, ConfigError, Options};
use redis::aio::{ConnectionManager, ConnectionManagerConfig, PubSub};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{
    Cmd, ConnectionAddr, ConnectionInfo, ErrorKind, FromRedisValue, RedisConnectionInfo,
    RedisError, RedisResult,
};
use std::fmt;
use std::future::Future;

#[derive(Clone)]
enum Connection {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

/// Live connection to Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: Connection,
    /// Standalone client kept around to open pub/sub connections
    pubsub_client: Option<redis::Client>,
    client_type: ClientType,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("client_type", &self.client_type)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect according to `options`.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingHosts`] when no host is configured, or the
    /// Redis error if the connection cannot be established.
    pub async fn connect(options: &Options) -> Result<Self, Error> {
        if options.hosts.is_empty() {
            return Err(ConfigError::MissingHosts.into());
        }

        let store = match options.client_type {
            ClientType::Normal => Self::connect_single(options).await?,
            ClientType::Cluster => Self::connect_cluster(options).await?,
        };
        Ok(store)
    }

    async fn connect_single(options: &Options) -> RedisResult<Self> {
        let host = options.primary_host().unwrap_or_default();
        let client = redis::Client::open(connection_info(host, options.database, options)?)?;

        let mut config = ConnectionManagerConfig::new();
        if let Some(timeout) = options.connect_timeout {
            config = config.set_connection_timeout(timeout);
        }
        if let Some(timeout) = options.response_timeout {
            config = config.set_response_timeout(timeout);
        }

        let manager = ConnectionManager::new_with_config(client.clone(), config).await?;
        tracing::info!(host, database = options.database, "connected to redis");

        Ok(Self {
            connection: Connection::Single(manager),
            pubsub_client: Some(client),
            client_type: ClientType::Normal,
        })
    }

    async fn connect_cluster(options: &Options) -> RedisResult<Self> {
        let nodes = options
            .hosts
            .iter()
            .map(|host| connection_info(host, 0, options))
            .collect::<RedisResult<Vec<_>>>()?;

        let mut builder = ClusterClientBuilder::new(nodes);
        if let Some(password) = &options.password {
            builder = builder.password(password.clone());
        }
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connection_timeout(timeout);
        }
        if let Some(timeout) = options.response_timeout {
            builder = builder.response_timeout(timeout);
        }
        if options.read_only {
            builder = builder.read_from_replicas();
        }

        let connection = builder.build()?.get_async_connection().await?;
        tracing::info!(
            nodes = options.hosts.len(),
            read_from_replicas = options.read_only,
            "connected to redis cluster"
        );

        Ok(Self {
            connection: Connection::Cluster(connection),
            pubsub_client: None,
            client_type: ClientType::Cluster,
        })
    }

    /// Deployment type of this connection.
    pub fn client_type(&self) -> ClientType {
        self.client_type
    }
}

/// Build connection info for a `host:port` address.
fn connection_info(addr: &str, db: i64, options: &Options) -> RedisResult<ConnectionInfo> {
    let (host, port) = split_host_port(addr)?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            db,
            password: options.password.clone(),
            ..RedisConnectionInfo::default()
        },
    })
}

fn split_host_port(addr: &str) -> RedisResult<(&str, u16)> {
    let invalid = || {
        RedisError::from((
            ErrorKind::InvalidClientConfig,
            "invalid redis address",
            addr.to_string(),
        ))
    };

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse().map_err(|_| invalid())?;
    Ok((host.trim_start_matches('[').trim_end_matches(']'), port))
}

impl CommandExecutor for RedisStore {
    type Subscription = PubSub;

    fn execute<T>(&self, cmd: Cmd) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send,
    {
        let connection = self.connection.clone();
        async move {
            match connection {
                Connection::Single(mut conn) => cmd.query_async(&mut conn).await,
                Connection::Cluster(mut conn) => cmd.query_async(&mut conn).await,
            }
        }
    }

    fn execute_pipeline<T>(&self, cmds: Vec<Cmd>) -> impl Future<Output = RedisResult<T>> + Send
    where
        T: FromRedisValue + Send,
    {
        let connection = self.connection.clone();
        let mut pipe = redis::pipe();
        for cmd in cmds {
            pipe.add_command(cmd);
        }

        async move {
            match connection {
                Connection::Single(mut conn) => pipe.query_async(&mut conn).await,
                Connection::Cluster(mut conn) => pipe.query_async(&mut conn).await,
            }
        }
    }

    fn subscribe(
        &self,
        channels: Vec<String>,
    ) -> impl Future<Output = RedisResult<Self::Subscription>> + Send {
        let client = self.pubsub_client.clone();
        async move {
            let client = client.ok_or_else(|| {
                RedisError::from((
                    ErrorKind::ClientError,
                    "pub/sub requires a standalone connection",
                ))
            })?;
            let mut pubsub = client.get_async_pubsub().await?;
            pubsub.subscribe(channels).await?;
            Ok(pubsub)
        }
    }
}
