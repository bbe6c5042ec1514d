//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock whose time only moves when told to.
///
/// Lets guard tests cross a backoff window without sleeping. Clones share the
/// same time value.
///
/// # Examples
///
/// ```
/// use guarded_redis::infrastructure::mocks::MockClock;
/// use guarded_redis::{BackoffGuard, GuardConfig};
/// use std::io;
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let clock = MockClock::new(Instant::now());
/// let guard = BackoffGuard::with_clock(
///     GuardConfig { max_consecutive_failures: 0, ..GuardConfig::default() },
///     Arc::new(clock.clone()),
/// );
///
/// guard.report_outcome(Some(&io::Error::from(io::ErrorKind::TimedOut)));
/// assert!(guard.is_open());
///
/// clock.advance(Duration::from_secs(1));
/// assert!(!guard.is_open());
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock") =
            instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}
