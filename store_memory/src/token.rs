//! In-memory token store.

use crate::lock;
use std::collections::HashMap;
use std::sync::Mutex;
use tokentrust_store::{StoreError, TokenRecord, TokenStore};
use tokentrust_types::{MerchantId, Timestamp, TokenId};

#[derive(Default)]
struct Inner {
    tokens: HashMap<TokenId, TokenRecord>,
    /// (merchant, idempotency key) → token id.
    idempotency: HashMap<(MerchantId, String), TokenId>,
}

/// Thread-safe token map with an idempotency-key index.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Inner>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self, id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(lock(&self.inner, "token store")?.tokens.get(id).cloned())
    }

    fn put_token(&self, token: &TokenRecord) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner, "token store")?;
        if let Some(key) = &token.idempotency_key {
            let slot = (token.merchant_id.clone(), key.clone());
            match inner.idempotency.get(&slot) {
                Some(existing) if existing != &token.id => {
                    return Err(StoreError::Duplicate(format!(
                        "idempotency key {key} of merchant {} already maps to {existing}",
                        token.merchant_id
                    )));
                }
                Some(_) => {}
                None => {
                    inner.idempotency.insert(slot, token.id.clone());
                }
            }
        }
        inner.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    fn find_by_idempotency(
        &self,
        merchant: &MerchantId,
        key: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let inner = lock(&self.inner, "token store")?;
        Ok(inner
            .idempotency
            .get(&(merchant.clone(), key.to_string()))
            .and_then(|id| inner.tokens.get(id))
            .cloned())
    }

    fn tokens_for_merchant(
        &self,
        merchant: &MerchantId,
        since: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<TokenRecord>, StoreError> {
        let inner = lock(&self.inner, "token store")?;
        let mut out: Vec<TokenRecord> = inner
            .tokens
            .values()
            .filter(|t| &t.merchant_id == merchant)
            .filter(|t| since.map_or(true, |s| t.issued_at >= s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    fn token_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.inner, "token store")?.tokens.len() as u64)
    }
}
