mod cancel;
mod context;
mod orchestrator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use cancel::CancelHandle;
pub use context::{ProgressFn, TaskContext};
pub use orchestrator::ImportOrchestrator;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    AwaitingDecision,
    Completed,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    QuestionImport,
    AssetStorage,
}

/// Answer to a suspended duplicate-asset task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDecision {
    Overwrite,
    Cancel,
}

/// Snapshot of one import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTask {
    pub id: Uuid,
    pub file_name: String,
    pub subject: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress_message: String,
    pub found_count: Option<usize>,
    pub result_count: Option<usize>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ImportTask {
    pub fn new(file_name: impl Into<String>, subject: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            subject: subject.into(),
            kind,
            status: TaskStatus::Processing,
            progress_message: "Queued".to_string(),
            found_count: None,
            result_count: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}
