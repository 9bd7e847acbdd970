//! WebSocket server for real-time merchant updates.
//!
//! Clients can subscribe to:
//! - Token updates (assigned, frozen, unfrozen, revoked)
//! - Verification events (requested, completed)
//! - Triage decisions
//!
//! Every subscription can be narrowed to a set of merchants or tokens.

pub mod error;
pub mod notifier;
pub mod server;
pub mod subscriptions;

pub use error::WsError;
pub use notifier::WsNotifier;
pub use server::{WebSocketServer, WsState};
pub use subscriptions::{
    ClientMessage, ClientSubscriptions, ServerMessage, SubscriptionEvent, SubscriptionFilter,
    SubscriptionTopic,
};
