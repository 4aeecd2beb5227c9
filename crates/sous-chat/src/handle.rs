//! A cloneable handle for observing the session from external code.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable handle for checking and awaiting the single-flight state.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    busy: Arc<AtomicBool>,
    idle_notify: Arc<tokio::sync::Notify>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Whether an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Wait until no exchange is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_busy() {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_busy() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    pub(crate) fn set_busy(&self) {
        self.busy.store(true, Ordering::Release);
    }

    pub(crate) fn set_idle(&self) {
        self.busy.store(false, Ordering::Release);
        self.idle_notify.notify_waiters();
    }
}
