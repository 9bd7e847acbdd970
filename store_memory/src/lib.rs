//! In-memory storage backend for TokenTrust.
//!
//! Implements the `tokentrust-store` traits over `Mutex`-guarded maps. Each
//! store has its own leaf lock that is held only for the duration of a single
//! call and never acquires another lock.

pub mod audit;
pub mod event;
pub mod token;

pub use audit::MemoryAuditLog;
pub use event::MemoryEventStore;
pub use token::MemoryTokenStore;

use std::sync::{Mutex, MutexGuard};
use tokentrust_store::StoreError;

pub(crate) fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::Backend(format!("{what} lock poisoned")))
}
