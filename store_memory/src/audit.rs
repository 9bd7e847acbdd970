//! In-memory append-only audit log.

use crate::lock;
use std::sync::Mutex;
use tokentrust_store::{AuditEntry, AuditLog, NewAuditEntry, StoreError, GENESIS_DIGEST};
use tracing::trace;

#[derive(Default)]
struct Inner {
    entries: Vec<AuditEntry>,
    head: Option<[u8; 32]>,
}

/// Vector-backed audit log; entry `seq` lives at index `seq - 1`.
#[derive(Default)]
pub struct MemoryAuditLog {
    inner: Mutex<Inner>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let mut inner = lock(&self.inner, "audit log")?;
        let seq = inner.entries.len() as u64 + 1;
        let prev = inner.head.unwrap_or(GENESIS_DIGEST);
        let sealed = AuditEntry::seal(seq, prev, entry)?;
        inner.head = Some(sealed.digest_bytes()?);
        trace!(seq, action = %sealed.action, target = %sealed.target, "audit append");
        inner.entries.push(sealed.clone());
        Ok(sealed)
    }

    fn entries_for_target(&self, target: &str, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = lock(&self.inner, "audit log")?;
        let mut out: Vec<AuditEntry> = inner
            .entries
            .iter()
            .rev()
            .filter(|e| e.target == target)
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }

    fn entries_from(&self, from: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = lock(&self.inner, "audit log")?;
        let start = from.saturating_sub(1) as usize;
        Ok(inner.entries.iter().skip(start).take(limit).cloned().collect())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.inner, "audit log")?.entries.len() as u64)
    }
}
