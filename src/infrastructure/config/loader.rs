//! Turns a [`ParamSource`] into [`Options`].

use super::options::{ClientType, Options, RwType};
use super::source::ParamSource;
use super::ConfigError;
use crate::application::guard::GuardConfig;
use crate::domain::classifier::FailurePolicy;
use crate::domain::key::KeyPrefix;
use std::str::FromStr;
use std::time::Duration;

pub const REDIS_TYPE: &str = "REDIS_TYPE";
pub const REDIS_HOST: &str = "REDIS_HOST";
pub const REDIS_PORT: &str = "REDIS_PORT";
pub const REDIS_DB_NAME: &str = "REDIS_DB_NAME";
pub const REDIS_DB_PASSWORD: &str = "REDIS_DB_PASSWORD";
pub const REDIS_KEY_PREFIX: &str = "REDIS_KEY_PREFIX";
pub const REDIS_TIMEOUT: &str = "REDIS_TIMEOUT";
pub const REDIS_BACKOFF: &str = "REDIS_BACKOFF";
pub const REDIS_MAX_FAILURES: &str = "REDIS_MAX_FAILURES";
pub const REDIS_FAILURE_POLICY: &str = "REDIS_FAILURE_POLICY";

/// Port used when none is configured.
pub const DEFAULT_PORT: &str = "6379";

/// Build options from `source`, reading the key set selected by `rw`.
pub fn build_options(source: &ParamSource, rw: RwType) -> Result<Options, ConfigError> {
    let key = |base: &str| rw.key(base);

    let client_type = match source.get_str(&key(REDIS_TYPE)) {
        None => ClientType::Normal,
        Some(raw) => raw.parse::<ClientType>().unwrap_or_else(|reason: String| {
            tracing::warn!(value = raw, %reason, "falling back to normal client");
            ClientType::Normal
        }),
    };

    let hosts = pair_hosts(
        &source.get_list(&key(REDIS_PORT)),
        &source.get_list(&key(REDIS_HOST)),
    );

    let timeout = parse_seconds(source, &key(REDIS_TIMEOUT))?.filter(|t| !t.is_zero());

    let defaults = GuardConfig::default();
    let guard = GuardConfig {
        backoff: parse_seconds(source, &key(REDIS_BACKOFF))?.unwrap_or(defaults.backoff),
        max_consecutive_failures: parse_value(source, &key(REDIS_MAX_FAILURES))?
            .unwrap_or(defaults.max_consecutive_failures),
        policy: parse_value::<FailurePolicy>(source, &key(REDIS_FAILURE_POLICY))?
            .unwrap_or(defaults.policy),
    };

    Ok(Options {
        client_type,
        hosts,
        database: parse_value(source, &key(REDIS_DB_NAME))?.unwrap_or(0),
        password: source.get_str(&key(REDIS_DB_PASSWORD)).map(str::to_string),
        key_prefix: KeyPrefix::new(source.get_str(&key(REDIS_KEY_PREFIX)).unwrap_or_default()),
        read_only: rw.is_read_only(),
        connect_timeout: timeout,
        response_timeout: timeout,
        guard,
    })
}

/// Combine host and port lists into `host:port` addresses.
///
/// Lists of equal length pair up index by index. Otherwise every host gets the
/// first port, or 6379 when no port is configured.
pub fn pair_hosts(ports: &[String], hosts: &[String]) -> Vec<String> {
    let addrs: Vec<String> = if ports.len() == hosts.len() {
        hosts
            .iter()
            .zip(ports)
            .map(|(host, port)| format!("{}:{}", host, port))
            .collect()
    } else {
        let port = match ports.first() {
            None => {
                tracing::warn!(port = DEFAULT_PORT, "REDIS_PORT not set, using default port");
                DEFAULT_PORT
            }
            Some(port) => {
                tracing::warn!(
                    port = %port,
                    ports = ports.len(),
                    hosts = hosts.len(),
                    "REDIS_PORT count does not match REDIS_HOST count, using first port"
                );
                port.as_str()
            }
        };
        hosts
            .iter()
            .map(|host| format!("{}:{}", host, port))
            .collect()
    };

    if addrs.is_empty() {
        tracing::warn!("no redis hosts configured");
    }
    addrs
}

fn parse_value<T>(source: &ParamSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    source
        .get_str(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_seconds(source: &ParamSource, key: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(secs) = parse_value::<f64>(source, key)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: secs.to_string(),
            reason: e.to_string(),
        })
}
