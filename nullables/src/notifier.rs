//! Nullable notifier: records notifications instead of delivering them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokentrust_lifecycle::{Notification, Notifier, NotifyError};
use tokentrust_types::MerchantId;

#[derive(Default)]
pub struct NullNotifier {
    sent: Mutex<Vec<(MerchantId, Notification)>>,
    failing: AtomicBool,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        let n = Self::default();
        n.set_failing(true);
        n
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<(MerchantId, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    /// Kinds (`token.assigned`, `verification.requested`, ...) delivered so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|(_, n)| n.kind()).collect()
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl Notifier for NullNotifier {
    fn notify(&self, merchant: &MerchantId, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("null notifier set to fail".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((merchant.clone(), notification.clone()));
        Ok(())
    }
}
