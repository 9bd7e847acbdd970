//! Append-only audit log.
//!
//! Every state-affecting call appends exactly one entry. Entries are chained:
//! each carries the Blake2b-256 digest of its own contents and of the entry
//! before it, so any rewrite of history breaks [`verify_chain`].

use crate::StoreError;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokentrust_types::Timestamp;

type Blake2b256 = Blake2b<U32>;

/// Digest that precedes the first entry.
pub const GENESIS_DIGEST: [u8; 32] = [0u8; 32];

/// Kind of action recorded in an audit entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "issue")]
    Issue,
    #[serde(rename = "analyze")]
    Analyze,
    #[serde(rename = "freeze")]
    Freeze,
    #[serde(rename = "freeze(no-op)")]
    FreezeNoop,
    #[serde(rename = "unfreeze")]
    Unfreeze,
    #[serde(rename = "unfreeze(no-op)")]
    UnfreezeNoop,
    #[serde(rename = "revoke")]
    Revoke,
    #[serde(rename = "revoke(no-op)")]
    RevokeNoop,
    #[serde(rename = "verify(success)")]
    VerifySuccess,
    #[serde(rename = "verify(failure)")]
    VerifyFailure,
    #[serde(rename = "verify(timeout)")]
    VerifyTimeout,
    #[serde(rename = "triage")]
    Triage,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Analyze => "analyze",
            Self::Freeze => "freeze",
            Self::FreezeNoop => "freeze(no-op)",
            Self::Unfreeze => "unfreeze",
            Self::UnfreezeNoop => "unfreeze(no-op)",
            Self::Revoke => "revoke",
            Self::RevokeNoop => "revoke(no-op)",
            Self::VerifySuccess => "verify(success)",
            Self::VerifyFailure => "verify(failure)",
            Self::VerifyTimeout => "verify(timeout)",
            Self::Triage => "triage",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::FreezeNoop | Self::UnfreezeNoop | Self::RevokeNoop)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry as submitted by the core, before the log assigns its sequence
/// number and digests.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAuditEntry {
    pub timestamp: Timestamp,
    pub action: AuditAction,
    pub actor: String,
    /// Token or event id the action applies to.
    pub target: String,
    pub reason: String,
    pub detail: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(
        timestamp: Timestamp,
        action: AuditAction,
        actor: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            action,
            actor: actor.into(),
            target: target.into(),
            reason: reason.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// A committed, immutable audit entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub timestamp: Timestamp,
    pub action: AuditAction,
    pub actor: String,
    pub target: String,
    pub reason: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    /// Hex digest of the previous entry (all zeroes for the first).
    pub prev_digest: String,
    /// Hex digest of this entry.
    pub digest: String,
}

impl AuditEntry {
    /// Seal a new entry at position `seq` after `prev`.
    pub fn seal(seq: u64, prev: [u8; 32], entry: NewAuditEntry) -> Result<Self, StoreError> {
        let digest = chain_digest(&prev, seq, &entry)?;
        Ok(Self {
            seq,
            timestamp: entry.timestamp,
            action: entry.action,
            actor: entry.actor,
            target: entry.target,
            reason: entry.reason,
            detail: entry.detail,
            prev_digest: hex::encode(prev),
            digest: hex::encode(digest),
        })
    }

    pub fn digest_bytes(&self) -> Result<[u8; 32], StoreError> {
        decode_digest(&self.digest)
    }
}

/// Trait for the append-only audit log.
pub trait AuditLog: Send + Sync {
    /// Append an entry and return it with its assigned sequence number.
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;

    /// The most recent `limit` entries for `target`, oldest first.
    fn entries_for_target(&self, target: &str, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    /// Entries with `seq` in `from..from + limit`.
    fn entries_from(&self, from: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    fn len(&self) -> Result<u64, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Re-derive every digest and check the links between entries.
    fn verify_chain(&self) -> Result<(), StoreError> {
        let entries = self.entries_from(1, usize::MAX)?;
        verify_chain(&entries)
    }
}

/// Digest of `entry` at position `seq`, chained onto `prev`.
///
/// Variable-length fields are length-prefixed so that no two distinct
/// entries hash the same input stream.
pub fn chain_digest(prev: &[u8; 32], seq: u64, entry: &NewAuditEntry) -> Result<[u8; 32], StoreError> {
    let detail = serde_json::to_vec(&entry.detail)?;
    let mut hasher = Blake2b256::new();
    hasher.update(prev);
    hasher.update(seq.to_le_bytes());
    hasher.update(entry.timestamp.as_secs().to_le_bytes());
    for part in [
        entry.action.as_str().as_bytes(),
        entry.actor.as_bytes(),
        entry.target.as_bytes(),
        entry.reason.as_bytes(),
        detail.as_slice(),
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    Ok(output)
}

/// Check a contiguous run of entries starting at seq 1.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), StoreError> {
    let mut prev = GENESIS_DIGEST;
    for (i, entry) in entries.iter().enumerate() {
        let expected_seq = i as u64 + 1;
        if entry.seq != expected_seq {
            return Err(StoreError::Corruption(format!(
                "expected seq {expected_seq}, found {}",
                entry.seq
            )));
        }
        if decode_digest(&entry.prev_digest)? != prev {
            return Err(StoreError::Corruption(format!(
                "entry {} does not link to its predecessor",
                entry.seq
            )));
        }
        let unsealed = NewAuditEntry {
            timestamp: entry.timestamp,
            action: entry.action,
            actor: entry.actor.clone(),
            target: entry.target.clone(),
            reason: entry.reason.clone(),
            detail: entry.detail.clone(),
        };
        let digest = chain_digest(&prev, entry.seq, &unsealed)?;
        if decode_digest(&entry.digest)? != digest {
            return Err(StoreError::Corruption(format!(
                "entry {} digest mismatch",
                entry.seq
            )));
        }
        prev = digest;
    }
    Ok(())
}

fn decode_digest(s: &str) -> Result<[u8; 32], StoreError> {
    let bytes = hex::decode(s).map_err(|e| StoreError::Corruption(format!("bad digest: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| StoreError::Corruption("digest must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action: AuditAction, target: &str) -> NewAuditEntry {
        NewAuditEntry::new(Timestamp::new(1_000), action, "system", target, "test")
    }

    fn build_chain(n: usize) -> Vec<AuditEntry> {
        let mut prev = GENESIS_DIGEST;
        let mut out = Vec::new();
        for i in 0..n {
            let entry = AuditEntry::seal(i as u64 + 1, prev, sample(AuditAction::Freeze, "tok_a")).unwrap();
            prev = entry.digest_bytes().unwrap();
            out.push(entry);
        }
        out
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuditAction::FreezeNoop).unwrap(),
            "\"freeze(no-op)\""
        );
        assert_eq!(AuditAction::VerifyTimeout.to_string(), "verify(timeout)");
        assert!(AuditAction::RevokeNoop.is_noop());
        assert!(!AuditAction::Revoke.is_noop());
    }

    #[test]
    fn sealed_chain_verifies() {
        let chain = build_chain(5);
        assert_eq!(chain[0].prev_digest, hex::encode(GENESIS_DIGEST));
        assert_eq!(chain[1].prev_digest, chain[0].digest);
        verify_chain(&chain).unwrap();
    }

    #[test]
    fn tampered_reason_detected() {
        let mut chain = build_chain(3);
        chain[1].reason = "rewritten".into();
        assert!(matches!(verify_chain(&chain), Err(StoreError::Corruption(_))));
    }

    #[test]
    fn removed_entry_detected() {
        let mut chain = build_chain(3);
        chain.remove(1);
        assert!(verify_chain(&chain).is_err());
    }

    #[test]
    fn detail_changes_digest() {
        let a = sample(AuditAction::Triage, "evt_1");
        let b = a.clone().with_detail(serde_json::json!({"decision": "revoke"}));
        assert_ne!(
            chain_digest(&GENESIS_DIGEST, 1, &a).unwrap(),
            chain_digest(&GENESIS_DIGEST, 1, &b).unwrap()
        );
    }
}
