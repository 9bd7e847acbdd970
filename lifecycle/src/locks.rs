//! Per-token mutual exclusion.
//!
//! Every mutation of a token or of one of its events runs while holding that
//! token's mutex. Operations on different tokens never contend beyond the
//! short lookup in the table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokentrust_types::TokenId;

#[derive(Default)]
pub struct TokenLocks {
    table: Mutex<HashMap<TokenId, Arc<Mutex<()>>>>,
}

impl TokenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `id`, created on first use. The table lock is released
    /// before the caller locks the returned handle. Pair with
    /// [`release`](Self::release).
    pub fn handle(&self, id: &TokenId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(id.clone()).or_default())
    }

    /// Give back a handle from [`handle`](Self::handle). The entry is dropped
    /// once no caller holds it, so lookups of unknown ids leave nothing behind.
    pub fn release(&self, id: &TokenId, handle: Arc<Mutex<()>>) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        drop(handle);
        if table.get(id).is_some_and(|h| Arc::strong_count(h) == 1) {
            table.remove(id);
        }
    }

    /// Number of tokens with a handle currently out.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
