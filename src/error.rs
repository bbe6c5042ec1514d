//! Crate error type.

use crate::application::guard::GuardError;
use crate::domain::classifier::TransportFailure;
use crate::infrastructure::config::ConfigError;
use redis::RedisError;

/// Errors returned by the client facade and its constructors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A guarded command was rejected without contacting Redis.
    #[error("redis is locked after repeated failures, will try again later")]
    GuardOpen,
    /// Redis returned an error or could not be reached.
    #[error(transparent)]
    Redis(#[from] RedisError),
    /// Client configuration could not be assembled.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns `true` if the guard rejected the call.
    pub fn is_guard_open(&self) -> bool {
        matches!(self, Error::GuardOpen)
    }
}

impl From<GuardError<RedisError>> for Error {
    fn from(e: GuardError<RedisError>) -> Self {
        match e {
            GuardError::Open => Error::GuardOpen,
            GuardError::Inner(e) => Error::Redis(e),
        }
    }
}

impl TransportFailure for Error {
    fn is_transport_failure(&self) -> bool {
        match self {
            Error::Redis(e) => e.is_transport_failure(),
            Error::GuardOpen | Error::Config(_) => false,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
