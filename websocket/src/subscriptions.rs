//! Subscription management for WebSocket clients.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Available subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTopic {
    /// Token issuance and state changes.
    Tokens,
    /// Verification windows opening and closing.
    Verification,
    /// Triage decisions applied to events.
    Triage,
}

impl SubscriptionTopic {
    pub const ALL: [SubscriptionTopic; 3] = [Self::Tokens, Self::Verification, Self::Triage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Verification => "verification",
            Self::Triage => "triage",
        }
    }
}

impl fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional filter for subscriptions. Absent lists match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Only receive events for these merchants.
    #[serde(default)]
    pub merchants: Option<Vec<String>>,
    /// Only receive events for these tokens.
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &SubscriptionEvent) -> bool {
        if let Some(merchants) = &self.merchants {
            if !merchants.iter().any(|m| m == &event.merchant_id) {
                return false;
            }
        }
        if let Some(tokens) = &self.tokens {
            let token = event.data.get("token_id").and_then(|v| v.as_str());
            match token {
                Some(token) if tokens.iter().any(|t| t == token) => {}
                _ => return false,
            }
        }
        true
    }
}

/// An event sent to subscribed clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub topic: SubscriptionTopic,
    /// Fine-grained kind, e.g. `token.frozen` or `verification.requested`.
    pub event: String,
    pub merchant_id: String,
    pub data: serde_json::Value,
    pub timestamp: u64,
}

/// Messages a client may send.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        topic: SubscriptionTopic,
        #[serde(default)]
        filter: Option<SubscriptionFilter>,
    },
    Unsubscribe {
        topic: SubscriptionTopic,
    },
    Ping,
}

/// Control messages sent back to a client.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        action: String,
        topic: SubscriptionTopic,
    },
    Error {
        message: String,
    },
    Pong,
}

/// The topics (and their filters) one connection is subscribed to.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    topics: HashMap<SubscriptionTopic, Option<SubscriptionFilter>>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic, replacing any previous filter for it.
    pub fn subscribe(&mut self, topic: SubscriptionTopic, filter: Option<SubscriptionFilter>) {
        self.topics.insert(topic, filter);
    }

    /// Returns `true` if the client was subscribed.
    pub fn unsubscribe(&mut self, topic: &SubscriptionTopic) -> bool {
        self.topics.remove(topic).is_some()
    }

    pub fn is_subscribed(&self, topic: &SubscriptionTopic) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Whether `event` should be delivered under the subscription for `topic`.
    pub fn matches_filter(&self, topic: &SubscriptionTopic, event: &SubscriptionEvent) -> bool {
        if event.topic != *topic {
            return false;
        }
        match self.topics.get(topic) {
            None => false,
            Some(None) => true,
            Some(Some(filter)) => filter.matches(event),
        }
    }
}
