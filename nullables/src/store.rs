//! Nullable stores: fresh in-memory backends for each test.

use std::sync::Arc;
use tokentrust_lifecycle::Stores;
use tokentrust_store_memory::{MemoryAuditLog, MemoryEventStore, MemoryTokenStore};

pub fn null_stores() -> Stores {
    Stores {
        tokens: Arc::new(MemoryTokenStore::new()),
        events: Arc::new(MemoryEventStore::new()),
        audit: Arc::new(MemoryAuditLog::new()),
    }
}
