//! Mock implementations for testing.
//!
//! Test doubles for the infrastructure adapters, so the guard and the client
//! facade can be exercised without a live Redis or real time.

pub mod clock;
pub mod executor;
pub mod layer;

pub use clock::MockClock;
pub use executor::{render_command, MockExecutor};
pub use layer::{CapturedEvent, MockCaptureLayer};
