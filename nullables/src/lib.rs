//! Nullable infrastructure for deterministic testing.
//!
//! Every outside dependency of the lifecycle core (clock, notification
//! delivery, risk oracle, storage) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod notifier;
pub mod oracle;
pub mod store;

pub use clock::NullClock;
pub use notifier::NullNotifier;
pub use oracle::NullOracle;
pub use store::null_stores;
