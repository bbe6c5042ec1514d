//! Domain layer - pure logic with no I/O.
//!
//! - Failure classification (which errors trip the guard)
//! - Key namespacing

pub mod classifier;
pub mod key;
