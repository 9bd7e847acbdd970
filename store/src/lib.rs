//! Abstract storage traits for TokenTrust.
//!
//! Every storage backend (in-memory today, a durable store later) implements
//! these traits. The lifecycle core depends only on the traits and holds them
//! as `Arc<dyn ...>` so backends are swappable.
//!
//! Backends guarantee atomicity of a single `put_*`/`append` call only.
//! Serialising read-modify-write sequences on a token is the caller's job.

pub mod audit;
pub mod error;
pub mod event;
pub mod token;

pub use audit::{
    chain_digest, verify_chain, AuditAction, AuditEntry, AuditLog, NewAuditEntry, GENESIS_DIGEST,
};
pub use error::StoreError;
pub use event::{EventRecord, EventStore, TriageRecord, VerificationRecord};
pub use token::{TokenRecord, TokenStore};
