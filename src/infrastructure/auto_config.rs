//! Connected clients straight from deployment configuration.
//!
//! Each entry point assembles [`Options`] from its source, connects a
//! [`RedisStore`] and wraps it in a [`Client`] carrying the configured key
//! prefix and guard settings.

use crate::application::client::Client;
use crate::error::Result;
use crate::infrastructure::config::{self, Options, RwType};
use crate::infrastructure::redis_store::RedisStore;

impl Client<RedisStore> {
    /// Connect to Redis and build a client from `options`.
    ///
    /// # Errors
    /// Fails when no host is configured or the connection cannot be made.
    pub async fn connect(options: &Options) -> Result<Self> {
        let store = RedisStore::connect(options).await?;
        Ok(Client::builder(store)
            .with_key_prefix(options.key_prefix.clone())
            .with_guard_config(options.guard.clone())
            .build())
    }
}

/// Client configured from the volume file, overridden by environment variables.
///
/// # Example
/// ```no_run
/// use guarded_redis::{auto_config, RwType};
///
/// # async fn demo() -> guarded_redis::Result<()> {
/// let client = auto_config(RwType::ReadWrite).await?;
/// let visits = client.incr("visits").await?;
/// # Ok(())
/// # }
/// ```
pub async fn auto_config(rw: RwType) -> Result<Client<RedisStore>> {
    Client::connect(&config::options_from_merged(rw)?).await
}

/// Client configured from environment variables only.
pub async fn auto_config_from_env(rw: RwType) -> Result<Client<RedisStore>> {
    Client::connect(&config::options_from_env(rw)?).await
}

/// Client configured from the volume file only.
pub async fn auto_config_from_volume(rw: RwType) -> Result<Client<RedisStore>> {
    Client::connect(&config::options_from_volume(rw)?).await
}
