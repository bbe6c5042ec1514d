//! Failure-triggered backoff guard.
//!
//! Tracks consecutive qualifying failures of store calls. Once more than
//! `max_consecutive_failures` have been seen in a row, the guard opens and every
//! guarded call fails fast with [`GuardError::Open`] for `backoff`. The first
//! permission check after the backoff has elapsed closes the guard completely
//! and admits that call.
//!
//! # State Transitions
//!
//! ```text
//! Closed ──[failures > max_consecutive_failures]──> Open
//!   ▲                                                  │
//!   └────────[is_open() at/after opened_at + backoff]──┘
//! ```
//!
//! There is no half-open probe: after the backoff the guard trusts the store
//! again, and a still-failing store reopens it on its own.
//!
//! All state lives behind one mutex, so concurrent callers observe atomic
//! transitions. The lock is never held across an `.await`.

use crate::application::metrics::GuardMetrics;
use crate::application::ports::Clock;
use crate::domain::classifier::{FailurePolicy, TransportFailure};
use crate::infrastructure::clock::SystemClock;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Configuration for guard behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// How long the guard stays open
    pub backoff: Duration,
    /// Qualifying failures tolerated in a row; one more opens the guard
    pub max_consecutive_failures: u32,
    /// Which errors count as failures
    pub policy: FailurePolicy,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            max_consecutive_failures: 3,
            policy: FailurePolicy::Transport,
        }
    }
}

/// Observable guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Calls pass through.
    Closed {
        /// Qualifying failures seen in a row
        consecutive_failures: u32,
    },
    /// Calls are rejected until `opened_at + backoff`.
    Open {
        /// When the guard opened
        opened_at: Instant,
    },
}

impl GuardState {
    const CLOSED: GuardState = GuardState::Closed {
        consecutive_failures: 0,
    };

    /// Returns `true` for [`GuardState::Open`].
    pub fn is_open(&self) -> bool {
        matches!(self, GuardState::Open { .. })
    }
}

/// Result of a guarded call that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    /// The guard is open; the store was not contacted.
    #[error("store is locked after repeated failures, will try again later")]
    Open,
    /// The store call ran and failed. The error is passed through unmodified.
    #[error(transparent)]
    Inner(E),
}

impl<E> GuardError<E> {
    /// Returns `true` if the call was rejected by the guard.
    pub fn is_open(&self) -> bool {
        matches!(self, GuardError::Open)
    }

    /// The underlying store error, if the call was let through.
    pub fn into_inner(self) -> Option<E> {
        match self {
            GuardError::Open => None,
            GuardError::Inner(e) => Some(e),
        }
    }
}

/// Backoff guard shared by all operations wrapped for one store client.
#[derive(Debug)]
pub struct BackoffGuard {
    config: GuardConfig,
    state: Mutex<GuardState>,
    clock: Arc<dyn Clock>,
    metrics: GuardMetrics,
}

impl BackoffGuard {
    /// Create a guard using the system clock.
    pub fn new(config: GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a guard with a custom clock.
    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: Mutex::new(GuardState::CLOSED),
            clock,
            metrics: GuardMetrics::new(),
        }
    }

    // A panic while holding the lock cannot leave the state half-written:
    // every mutation is a single assignment.
    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Permission check, to be called before every guarded operation.
    ///
    /// Returns `true` while calls must be rejected. If the backoff has elapsed,
    /// the guard is reset to closed and `false` is returned, admitting the
    /// caller.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        let GuardState::Open { opened_at } = *state else {
            return false;
        };

        let elapsed = self.clock.now().saturating_duration_since(opened_at);
        if elapsed < self.config.backoff {
            return true;
        }

        *state = GuardState::CLOSED;
        drop(state);

        tracing::info!(
            backoff_ms = self.config.backoff.as_millis() as u64,
            "backoff elapsed, guard closed"
        );
        false
    }

    /// Feed the outcome of a call that was let through back into the guard.
    ///
    /// `None` means success. Must not be called for rejected calls. Reports
    /// arriving while the guard is open (calls admitted just before it opened)
    /// are ignored.
    pub fn report_outcome<E>(&self, error: Option<&E>)
    where
        E: TransportFailure + ?Sized,
    {
        let qualifies = self.config.policy.qualifies(error);

        let mut state = self.lock();
        let GuardState::Closed {
            consecutive_failures,
        } = &mut *state
        else {
            return;
        };

        if !qualifies {
            *consecutive_failures = 0;
            return;
        }

        *consecutive_failures = consecutive_failures.saturating_add(1);
        self.metrics.record_failure();

        if *consecutive_failures <= self.config.max_consecutive_failures {
            return;
        }

        let failures = *consecutive_failures;
        *state = GuardState::Open {
            opened_at: self.clock.now(),
        };
        drop(state);

        self.metrics.record_opened();
        tracing::warn!(
            consecutive_failures = failures,
            backoff_ms = self.config.backoff.as_millis() as u64,
            "guard opened, rejecting calls until backoff elapses"
        );
    }

    fn admit<E>(&self) -> Result<(), GuardError<E>> {
        if self.is_open() {
            self.metrics.record_rejected();
            tracing::debug!("call rejected, guard is open");
            Err(GuardError::Open)
        } else {
            self.metrics.record_admitted();
            Ok(())
        }
    }

    /// Run an asynchronous store operation under the guard.
    ///
    /// `op` is only invoked when the guard is closed. Its result is reported
    /// to the guard and returned unmodified (errors wrapped in
    /// [`GuardError::Inner`]).
    ///
    /// # Example
    /// ```
    /// use guarded_redis::{BackoffGuard, GuardConfig, GuardError};
    /// use std::io;
    ///
    /// # async fn demo() {
    /// let guard = BackoffGuard::new(GuardConfig {
    ///     max_consecutive_failures: 0,
    ///     ..GuardConfig::default()
    /// });
    ///
    /// let refused = || async { Err::<i64, _>(io::Error::from(io::ErrorKind::ConnectionRefused)) };
    /// assert!(matches!(guard.run(refused).await, Err(GuardError::Inner(_))));
    /// assert!(matches!(guard.run(refused).await, Err(GuardError::Open)));
    /// # }
    /// ```
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransportFailure,
    {
        self.admit()?;
        let result = op().await;
        self.report_outcome(result.as_ref().err());
        result.map_err(GuardError::Inner)
    }

    /// Synchronous counterpart of [`run`](BackoffGuard::run).
    pub fn run_blocking<T, E, F>(&self, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: TransportFailure,
    {
        self.admit()?;
        let result = op();
        self.report_outcome(result.as_ref().err());
        result.map_err(GuardError::Inner)
    }

    /// Current state, without triggering the expiry check.
    pub fn state(&self) -> GuardState {
        *self.lock()
    }

    /// Qualifying failures seen in a row. Always 0 while open.
    pub fn consecutive_failures(&self) -> u32 {
        match *self.lock() {
            GuardState::Closed {
                consecutive_failures,
            } => consecutive_failures,
            GuardState::Open { .. } => 0,
        }
    }

    /// The configuration this guard was built with.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Activity counters.
    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }
}

impl Default for BackoffGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

/// Shareable guard reference.
pub type SharedBackoffGuard = Arc<BackoffGuard>;
