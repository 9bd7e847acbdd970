//! Opaque identifiers for tokens, events and merchants.
//!
//! Token and event ids are generated as a prefix plus 128 random bits in hex
//! (`tok_…`, `evt_…`). Ids supplied by callers are accepted as-is; the core
//! never interprets them beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a trust token.
    TokenId
);

string_id!(
    /// Identifier of one risk-analysis event.
    EventId
);

string_id!(
    /// Identifier of the merchant that owns a token.
    MerchantId
);

impl TokenId {
    pub const PREFIX: &'static str = "tok_";

    /// Generate a fresh, globally unique token id.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, random_hex()))
    }
}

impl EventId {
    pub const PREFIX: &'static str = "evt_";

    /// Generate a fresh, globally unique event id.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, random_hex()))
    }
}

/// 16 random bytes, hex encoded.
///
/// Falls back to a clock/counter mix if the OS entropy source is unavailable;
/// uniqueness within the process is still guaranteed by the counter.
fn random_hex() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut buf = [0u8; 16];
    if getrandom::getrandom(&mut buf).is_err() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        buf[..8].copy_from_slice(&nanos.to_be_bytes());
        buf[8..].copy_from_slice(&count.to_be_bytes());
    }
    hex::encode(buf)
}
