//! Application layer - guarding and namespacing of store calls.
//!
//! This layer coordinates the domain rules and manages runtime behavior:
//! - Backoff guard (failure counting, open/closed state)
//! - Guard metrics
//! - Client facade (key prefixing, guarded counters)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from the Redis connection details.

pub mod client;
pub mod guard;
pub mod metrics;
pub mod ports;
