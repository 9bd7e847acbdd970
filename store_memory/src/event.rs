//! In-memory event store.

use crate::lock;
use std::collections::HashMap;
use std::sync::Mutex;
use tokentrust_store::{EventRecord, EventStore, StoreError};
use tokentrust_types::{EventId, TokenId};

#[derive(Default)]
struct Inner {
    events: HashMap<EventId, EventRecord>,
    /// token → event ids in creation order.
    by_token: HashMap<TokenId, Vec<EventId>>,
}

#[derive(Default)]
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn get_event(&self, id: &EventId) -> Result<Option<EventRecord>, StoreError> {
        Ok(lock(&self.inner, "event store")?.events.get(id).cloned())
    }

    fn put_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner, "event store")?;
        if let Some(existing) = inner.events.get(&event.id) {
            if existing.token_id != event.token_id {
                return Err(StoreError::Duplicate(format!(
                    "event {} already belongs to token {}",
                    event.id, existing.token_id
                )));
            }
        } else {
            inner
                .by_token
                .entry(event.token_id.clone())
                .or_default()
                .push(event.id.clone());
        }
        inner.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    fn events_for_token(&self, token: &TokenId) -> Result<Vec<EventRecord>, StoreError> {
        let inner = lock(&self.inner, "event store")?;
        Ok(inner
            .by_token
            .get(token)
            .map(|ids| ids.iter().filter_map(|id| inner.events.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    fn open_events(&self) -> Result<Vec<EventRecord>, StoreError> {
        let inner = lock(&self.inner, "event store")?;
        let mut open: Vec<EventRecord> = inner
            .events
            .values()
            .filter(|e| e.status.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(open)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.inner, "event store")?.events.len() as u64)
    }
}
