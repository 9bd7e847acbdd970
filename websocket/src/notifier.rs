//! [`Notifier`] adapter that pushes merchant notifications to WebSocket
//! subscribers.

use std::sync::Arc;
use tokentrust_lifecycle::{Notification, Notifier, NotifyError};
use tokentrust_types::MerchantId;
use tracing::debug;

use crate::server::WsState;

pub struct WsNotifier {
    state: Arc<WsState>,
}

impl WsNotifier {
    pub fn new(state: Arc<WsState>) -> Self {
        Self { state }
    }
}

impl Notifier for WsNotifier {
    fn notify(&self, merchant: &MerchantId, notification: &Notification) -> Result<(), NotifyError> {
        let delivered = self
            .state
            .publish_notification(merchant, notification)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        debug!(
            merchant = %merchant,
            kind = notification.kind(),
            delivered,
            "notification published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::SubscriptionEvent;
    use tokentrust_types::{Timestamp, TokenId};

    #[test]
    fn publishes_on_tokens_topic() {
        let state = Arc::new(WsState::new(4));
        let mut rx = state.tokens_tx.subscribe();
        let notifier = WsNotifier::new(state);

        notifier
            .notify(
                &MerchantId::new("m1"),
                &Notification::TokenAssigned {
                    token_id: TokenId::new("tok_a"),
                    customer_id: "c1".into(),
                    amount: 1_000,
                    currency: "INR".into(),
                    expires_at: Timestamp::new(3_600),
                },
            )
            .unwrap();

        let event: SubscriptionEvent = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(event.event, "token.assigned");
        assert_eq!(event.data["amount"], 1_000);
    }

    #[test]
    fn no_listeners_still_succeeds() {
        let notifier = WsNotifier::new(Arc::new(WsState::new(4)));
        let result = notifier.notify(
            &MerchantId::new("m1"),
            &Notification::TokenAssigned {
                token_id: TokenId::new("tok_a"),
                customer_id: "c1".into(),
                amount: 1,
                currency: "INR".into(),
                expires_at: Timestamp::new(1),
            },
        );
        assert!(result.is_ok());
    }
}
