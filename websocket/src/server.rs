//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws` and allows clients to subscribe
//! to real-time event topics (tokens, verification, triage). Events are
//! delivered via broadcast channels and filtered per-client based on
//! subscription filters, so a merchant only sees its own tokens.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokentrust_lifecycle::{LifecycleEvent, Notification};
use tokentrust_types::{MerchantId, Timestamp};
use tracing::{debug, info, warn};

use crate::error::WsError;
use crate::subscriptions::{
    ClientMessage, ClientSubscriptions, ServerMessage, SubscriptionEvent, SubscriptionFilter,
    SubscriptionTopic,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared state for the WebSocket server, holding broadcast channels
/// for each event topic.
pub struct WsState {
    /// Token issuance and state changes.
    pub tokens_tx: broadcast::Sender<String>,
    /// Verification requests and outcomes.
    pub verification_tx: broadcast::Sender<String>,
    /// Triage decisions.
    pub triage_tx: broadcast::Sender<String>,
}

impl WsState {
    /// Create a new `WsState` with the given channel capacity for each topic.
    pub fn new(channel_capacity: usize) -> Self {
        let (tokens_tx, _) = broadcast::channel(channel_capacity);
        let (verification_tx, _) = broadcast::channel(channel_capacity);
        let (triage_tx, _) = broadcast::channel(channel_capacity);

        Self {
            tokens_tx,
            verification_tx,
            triage_tx,
        }
    }

    /// Get the broadcast sender for a given topic.
    pub fn sender_for(&self, topic: &SubscriptionTopic) -> &broadcast::Sender<String> {
        match topic {
            SubscriptionTopic::Tokens => &self.tokens_tx,
            SubscriptionTopic::Verification => &self.verification_tx,
            SubscriptionTopic::Triage => &self.triage_tx,
        }
    }

    /// Broadcast an event on its topic. Returns the number of connected
    /// forwarders that received it (0 when nobody is listening).
    pub fn publish(&self, event: &SubscriptionEvent) -> Result<usize, serde_json::Error> {
        let payload = serde_json::to_string(event)?;
        Ok(self.sender_for(&event.topic).send(payload).unwrap_or(0))
    }

    /// Publish a merchant notification produced by the lifecycle core.
    pub fn publish_notification(
        &self,
        merchant: &MerchantId,
        notification: &Notification,
    ) -> Result<usize, serde_json::Error> {
        let topic = match notification {
            Notification::TokenAssigned { .. } | Notification::TokenStateChanged { .. } => {
                SubscriptionTopic::Tokens
            }
            Notification::VerificationRequested { .. } => SubscriptionTopic::Verification,
        };
        let event = SubscriptionEvent {
            topic,
            event: notification.kind().to_string(),
            merchant_id: merchant.to_string(),
            data: serde_json::to_value(notification)?,
            timestamp: Timestamp::now().as_secs(),
        };
        self.publish(&event)
    }

    /// Publish the lifecycle events that have no merchant notification of
    /// their own: verification outcomes and triage decisions.
    pub fn publish_lifecycle(&self, event: &LifecycleEvent) -> Result<usize, serde_json::Error> {
        let (topic, kind, data) = match event {
            LifecycleEvent::VerificationCompleted {
                event_id,
                token_id,
                result,
                ..
            } => (
                SubscriptionTopic::Verification,
                "verification.completed",
                json!({
                    "event_id": event_id,
                    "token_id": token_id,
                    "result": result.as_str(),
                }),
            ),
            LifecycleEvent::Triaged {
                event_id,
                token_id,
                decision,
                closed_verification,
                ..
            } => (
                SubscriptionTopic::Triage,
                "event.triaged",
                json!({
                    "event_id": event_id,
                    "token_id": token_id,
                    "decision": decision,
                    "closed_verification": closed_verification,
                }),
            ),
            _ => return Ok(0),
        };
        self.publish(&SubscriptionEvent {
            topic,
            event: kind.to_string(),
            merchant_id: event.merchant_id().to_string(),
            data,
            timestamp: Timestamp::now().as_secs(),
        })
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    /// Create a new server with the default channel capacity.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: Arc::new(WsState::default()),
        }
    }

    /// Create a new server with the provided shared state.
    pub fn with_state(port: u16, state: Arc<WsState>) -> Self {
        Self { port, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    /// Start listening for WebSocket connections. Runs until any message
    /// arrives on `shutdown`.
    pub async fn start<S>(&self, mut shutdown: broadcast::Receiver<S>) -> Result<(), WsError>
    where
        S: Clone + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| WsError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("WebSocket server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;
        info!("WebSocket server stopped");
        Ok(())
    }
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
///
/// Each active subscription gets a forwarder task reading from the topic's
/// broadcast channel. All forwarders are aborted when the client leaves.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));

    let mut client_subs = ClientSubscriptions::new();
    let mut forwarders: HashMap<SubscriptionTopic, JoinHandle<()>> = HashMap::new();

    debug!("New WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(&text, &state, &mut client_subs, &mut forwarders, &ws_sender)
                    .await;
            }
            Message::Close(_) => {
                debug!("Client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    for (topic, handle) in forwarders.drain() {
        debug!("Aborting forwarder for topic: {}", topic);
        handle.abort();
    }
    debug!("WebSocket client disconnected");
}

/// Process a text message from the client.
async fn handle_text_message(
    text: &str,
    state: &Arc<WsState>,
    client_subs: &mut ClientSubscriptions,
    forwarders: &mut HashMap<SubscriptionTopic, JoinHandle<()>>,
    ws_sender: &WsSender,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let reply = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            send_server_message(ws_sender, &reply).await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe { topic, filter } => {
            if let Some(handle) = forwarders.remove(&topic) {
                handle.abort();
            }
            client_subs.subscribe(topic, filter.clone());

            let rx = state.sender_for(&topic).subscribe();
            let sender = ws_sender.clone();
            let handle = tokio::spawn(forward_events(rx, sender, topic, filter));
            forwarders.insert(topic, handle);

            let ack = ServerMessage::Ack {
                action: "subscribe".to_string(),
                topic,
            };
            send_server_message(ws_sender, &ack).await;
            debug!("Client subscribed to {}", topic);
        }
        ClientMessage::Unsubscribe { topic } => {
            let was_subscribed = client_subs.unsubscribe(&topic);
            if let Some(handle) = forwarders.remove(&topic) {
                handle.abort();
            }

            let reply = if was_subscribed {
                ServerMessage::Ack {
                    action: "unsubscribe".to_string(),
                    topic,
                }
            } else {
                ServerMessage::Error {
                    message: format!("Not subscribed to {}", topic),
                }
            };
            send_server_message(ws_sender, &reply).await;
            debug!("Client unsubscribed from {}", topic);
        }
        ClientMessage::Ping => {
            send_server_message(ws_sender, &ServerMessage::Pong).await;
        }
    }
}

async fn send_server_message(ws_sender: &WsSender, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(text) => {
            let mut sender = ws_sender.lock().await;
            let _ = sender.send(Message::Text(text)).await;
        }
        Err(e) => warn!("failed to encode server message: {}", e),
    }
}

/// Forwarder task: reads events from a broadcast receiver and sends matching
/// ones to the WebSocket client.
async fn forward_events(
    mut rx: broadcast::Receiver<String>,
    ws_sender: WsSender,
    topic: SubscriptionTopic,
    filter: Option<SubscriptionFilter>,
) {
    let mut matcher = ClientSubscriptions::new();
    matcher.subscribe(topic, filter);

    loop {
        match rx.recv().await {
            Ok(payload) => {
                // Unparseable payloads are dropped; they cannot be attributed to a merchant.
                let should_send = serde_json::from_str::<SubscriptionEvent>(&payload)
                    .map(|event| matcher.matches_filter(&topic, &event))
                    .unwrap_or(false);

                if should_send {
                    let mut sender = ws_sender.lock().await;
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Client lagged behind by {} events on topic {}", n, topic);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Broadcast channel closed for topic {}", topic);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokentrust_lifecycle::VerificationResult;
    use tokentrust_types::{AgentDecision, EventId, RiskTier, TokenId, TokenState};

    fn decode(raw: String) -> SubscriptionEvent {
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let state = WsState::new(8);
        let sent = state
            .publish_notification(
                &MerchantId::new("m1"),
                &Notification::TokenStateChanged {
                    token_id: TokenId::new("tok_a"),
                    state: TokenState::Frozen,
                    reason: "risk".into(),
                },
            )
            .unwrap();
        assert_eq!(sent, 0);
    }

    #[test]
    fn notifications_route_to_their_topic() {
        let state = WsState::new(8);
        let mut tokens = state.tokens_tx.subscribe();
        let mut verification = state.verification_tx.subscribe();

        state
            .publish_notification(
                &MerchantId::new("m1"),
                &Notification::VerificationRequested {
                    event_id: EventId::new("evt_1"),
                    token_id: TokenId::new("tok_a"),
                    amount: 500,
                    risk_score: 65,
                    tier: RiskTier::Medium,
                    deadline: Timestamp::new(1_600),
                    explanation: None,
                },
            )
            .unwrap();

        assert!(tokens.try_recv().is_err());
        let event = decode(verification.try_recv().unwrap());
        assert_eq!(event.topic, SubscriptionTopic::Verification);
        assert_eq!(event.event, "verification.requested");
        assert_eq!(event.merchant_id, "m1");
        assert_eq!(event.data["token_id"], "tok_a");
        assert_eq!(event.data["deadline"], 1_600);
    }

    #[test]
    fn state_changes_use_specific_kind() {
        let state = WsState::new(8);
        let mut tokens = state.tokens_tx.subscribe();
        state
            .publish_notification(
                &MerchantId::new("m1"),
                &Notification::TokenStateChanged {
                    token_id: TokenId::new("tok_a"),
                    state: TokenState::Revoked,
                    reason: "verification failed".into(),
                },
            )
            .unwrap();
        assert_eq!(decode(tokens.try_recv().unwrap()).event, "token.revoked");
    }

    #[test]
    fn lifecycle_outcomes_are_published() {
        let state = WsState::new(8);
        let mut verification = state.verification_tx.subscribe();
        let mut triage = state.triage_tx.subscribe();

        state
            .publish_lifecycle(&LifecycleEvent::VerificationCompleted {
                event_id: EventId::new("evt_1"),
                token_id: TokenId::new("tok_a"),
                merchant_id: MerchantId::new("m1"),
                result: VerificationResult::Timeout,
            })
            .unwrap();
        state
            .publish_lifecycle(&LifecycleEvent::Triaged {
                event_id: EventId::new("evt_1"),
                token_id: TokenId::new("tok_a"),
                merchant_id: MerchantId::new("m1"),
                decision: AgentDecision::Approve,
                closed_verification: true,
            })
            .unwrap();

        let completed = decode(verification.try_recv().unwrap());
        assert_eq!(completed.event, "verification.completed");
        assert_eq!(completed.data["result"], "timeout");

        let triaged = decode(triage.try_recv().unwrap());
        assert_eq!(triaged.data["decision"], "approve");
        assert_eq!(triaged.data["closed_verification"], true);
    }

    #[test]
    fn other_lifecycle_events_are_ignored() {
        let state = WsState::new(8);
        let mut tokens = state.tokens_tx.subscribe();
        let sent = state
            .publish_lifecycle(&LifecycleEvent::TokenIssued {
                token_id: TokenId::new("tok_a"),
                merchant_id: MerchantId::new("m1"),
            })
            .unwrap();
        assert_eq!(sent, 0);
        assert!(tokens.try_recv().is_err());
    }
}
