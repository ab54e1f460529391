use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

use crate::error::QbankError;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a task and whoever may stop it.
///
/// Cancellation is never preemptive: the running job observes it at its own
/// checkpoints through [`CancelHandle::checkpoint`] or races it against an
/// awaited call with [`CancelHandle::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`QbankError::Cancelled`] once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), QbankError> {
        if self.is_cancelled() {
            return Err(QbankError::Cancelled);
        }
        Ok(())
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            // register before checking the flag so a concurrent cancel is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
