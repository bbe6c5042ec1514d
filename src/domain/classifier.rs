//! Failure classification for the backoff guard.
//!
//! Decides whether the outcome of a store call counts toward the guard's
//! failure threshold. Two policies exist:
//!
//! - [`FailurePolicy::Transport`]: only connectivity-class errors count (refused,
//!   reset, timed out, dropped). Application errors such as `WRONGTYPE` do not.
//! - [`FailurePolicy::AnyError`]: every error counts.
//!
//! Classification is pure and cannot fail.

use std::fmt;
use std::io;
use std::str::FromStr;

/// Errors that can tell whether they originate from the transport.
pub trait TransportFailure {
    /// Returns `true` for network-level failures.
    fn is_transport_failure(&self) -> bool;
}

impl TransportFailure for redis::RedisError {
    fn is_transport_failure(&self) -> bool {
        self.is_io_error()
            || self.is_timeout()
            || self.is_connection_dropped()
            || self.is_connection_refusal()
    }
}

impl TransportFailure for io::Error {
    fn is_transport_failure(&self) -> bool {
        true
    }
}

/// Which errors qualify as guard-relevant failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Only transport/connectivity errors qualify.
    #[default]
    Transport,
    /// Any error qualifies.
    AnyError,
}

impl FailurePolicy {
    /// Classify an outcome. `None` means the call succeeded.
    ///
    /// # Example
    /// ```
    /// use guarded_redis::FailurePolicy;
    /// use std::io;
    ///
    /// let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
    /// assert!(FailurePolicy::Transport.qualifies(Some(&refused)));
    /// assert!(!FailurePolicy::AnyError.qualifies::<io::Error>(None));
    /// ```
    pub fn qualifies<E: TransportFailure + ?Sized>(&self, error: Option<&E>) -> bool {
        match (self, error) {
            (_, None) => false,
            (FailurePolicy::Transport, Some(e)) => e.is_transport_failure(),
            (FailurePolicy::AnyError, Some(_)) => true,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Transport => write!(f, "transport"),
            FailurePolicy::AnyError => write!(f, "any"),
        }
    }
}

/// Error returned when a failure policy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure policy `{0}`, expected `transport` or `any`")]
pub struct UnknownPolicy(pub String);

impl FromStr for FailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transport" | "network" => Ok(FailurePolicy::Transport),
            "any" | "any-error" | "broad" => Ok(FailurePolicy::AnyError),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ErrorKind, RedisError};

    fn refused() -> RedisError {
        RedisError::from(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))
    }

    fn wrong_type() -> RedisError {
        RedisError::from((ErrorKind::TypeError, "WRONGTYPE"))
    }

    #[test]
    fn test_success_never_qualifies() {
        assert!(!FailurePolicy::Transport.qualifies::<RedisError>(None));
        assert!(!FailurePolicy::AnyError.qualifies::<RedisError>(None));
    }

    #[test]
    fn test_transport_policy_counts_network_errors_only() {
        let policy = FailurePolicy::Transport;
        assert!(policy.qualifies(Some(&refused())));
        assert!(!policy.qualifies(Some(&wrong_type())));
    }

    #[test]
    fn test_any_error_policy_counts_everything() {
        let policy = FailurePolicy::AnyError;
        assert!(policy.qualifies(Some(&refused())));
        assert!(policy.qualifies(Some(&wrong_type())));
    }

    #[test]
    fn test_timeout_is_transport_failure() {
        let err = RedisError::from(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("transport".parse(), Ok(FailurePolicy::Transport));
        assert_eq!("Network".parse(), Ok(FailurePolicy::Transport));
        assert_eq!(" any ".parse(), Ok(FailurePolicy::AnyError));
        assert_eq!("broad".parse(), Ok(FailurePolicy::AnyError));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for policy in [FailurePolicy::Transport, FailurePolicy::AnyError] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }
}
