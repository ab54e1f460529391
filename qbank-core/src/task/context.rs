use std::{fmt, sync::Arc};

use uuid::Uuid;

use crate::error::QbankError;

use super::CancelHandle;

pub type ProgressFn = Arc<dyn Fn(String) + Send + Sync>;

/// Execution context handed to every stage of an import job.
///
/// Carries the job id, its cancellation handle and the progress sink. Progress
/// is dropped once the job is cancelled, so a cancelled job never reports again.
#[derive(Clone)]
pub struct TaskContext {
    pub id: Uuid,
    pub cancel: CancelHandle,
    progress: ProgressFn,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    pub fn new(id: Uuid, cancel: CancelHandle, progress: ProgressFn) -> Self {
        Self {
            id,
            cancel,
            progress,
        }
    }

    /// A context that is never cancelled from outside and discards progress.
    pub fn detached() -> Self {
        Self::new(Uuid::new_v4(), CancelHandle::new(), Arc::new(|_| {}))
    }

    pub fn report(&self, message: impl Into<String>) {
        if self.cancel.is_cancelled() {
            return;
        }
        (self.progress)(message.into());
    }

    pub fn checkpoint(&self) -> Result<(), QbankError> {
        self.cancel.checkpoint()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
