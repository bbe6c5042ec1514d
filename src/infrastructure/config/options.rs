//! Client construction parameters.

use crate::application::guard::GuardConfig;
use crate::domain::key::KeyPrefix;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Standalone or cluster deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    /// A single Redis server (the first configured host)
    #[default]
    Normal,
    /// A Redis Cluster seeded from every configured host
    Cluster,
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "normal" | "standalone" => Ok(ClientType::Normal),
            "cluster" => Ok(ClientType::Cluster),
            other => Err(format!("unknown client type `{}`", other)),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Normal => write!(f, "normal"),
            ClientType::Cluster => write!(f, "cluster"),
        }
    }
}

/// Which set of configuration keys to read.
///
/// Deployments often point readers at replicas: read-only keys carry a
/// `_READER` suffix (`REDIS_HOST_READER`) and produce a read-only connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RwType {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl RwType {
    /// Suffix appended to every configuration key.
    pub fn suffix(&self) -> &'static str {
        match self {
            RwType::ReadWrite => "",
            RwType::ReadOnly => "_READER",
        }
    }

    /// The configuration key for `base` under this access type.
    pub fn key(&self, base: &str) -> String {
        format!("{}{}", base, self.suffix())
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, RwType::ReadOnly)
    }
}

/// Everything needed to connect a [`Client`](crate::Client).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub client_type: ClientType,
    /// `host:port` addresses
    pub hosts: Vec<String>,
    /// Database index (standalone only)
    pub database: i64,
    pub password: Option<String>,
    /// Namespace prepended to every key
    pub key_prefix: KeyPrefix,
    /// Route reads to replicas (cluster only)
    pub read_only: bool,
    /// Timeout for establishing a connection
    pub connect_timeout: Option<Duration>,
    /// Timeout for a single command reply
    pub response_timeout: Option<Duration>,
    pub guard: GuardConfig,
}

impl Options {
    /// Options for the given hosts with every other setting at its default.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// The host a standalone client connects to.
    pub fn primary_host(&self) -> Option<&str> {
        self.hosts.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rw_type_keys() {
        assert_eq!(RwType::ReadWrite.key("REDIS_HOST"), "REDIS_HOST");
        assert_eq!(RwType::ReadOnly.key("REDIS_HOST"), "REDIS_HOST_READER");
        assert!(RwType::ReadOnly.is_read_only());
        assert!(!RwType::default().is_read_only());
    }

    #[test]
    fn test_client_type_parse() {
        assert_eq!("".parse(), Ok(ClientType::Normal));
        assert_eq!("Cluster".parse(), Ok(ClientType::Cluster));
        assert!("sentinel".parse::<ClientType>().is_err());
    }

    #[test]
    fn test_new_options() {
        let opts = Options::new(["a:6379", "b:6379"]);
        assert_eq!(opts.primary_host(), Some("a:6379"));
        assert_eq!(opts.client_type, ClientType::Normal);
        assert!(opts.key_prefix.is_empty());
        assert_eq!(Options::default().primary_host(), None);
    }
}
