// Task lifecycle bookkeeping
//
// Tasks run in the background independently of any client connection; the
// frontend can reconnect at any time and read the current state, or follow
// live updates through the WebSocket/SSE fan-out.

pub mod manager;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub use manager::{TaskHandle, TaskManager};

/// Seam through which long-running work reports progress percentages.
///
/// Implemented by [`TaskHandle`] for real tasks; stages that cover only a
/// slice of the overall task wrap the sink in a [`ScaledProgress`].
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: f32, message: &str);
}

/// Remaps a stage's local 0..=100 progress into a [lo, hi] slice of the task
pub struct ScaledProgress<'a> {
    sink: &'a dyn ProgressSink,
    lo: f32,
    hi: f32,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, lo: f32, hi: f32) -> Self {
        Self { sink, lo, hi }
    }
}

#[async_trait]
impl ProgressSink for ScaledProgress<'_> {
    async fn report(&self, progress: f32, message: &str) {
        let local = progress.clamp(0.0, 100.0) / 100.0;
        let scaled = self.lo + (self.hi - self.lo) * local;
        self.sink.report(scaled, message).await;
    }
}

/// Sink that discards progress, for callers that do not track it
pub struct NullProgress;

#[async_trait]
impl ProgressSink for NullProgress {
    async fn report(&self, _progress: f32, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateFromUrl,
    GenerateFromFile,
    Translate,
    Burn,
    Download,
}

/// What a finished task hands back to the manager
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    pub output_file: Option<PathBuf>,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub output_file: Option<PathBuf>,
    pub download_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: f32,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_filename: Option<String>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

/// Broadcast payload consumed by the WebSocket and SSE endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub kind: TaskEventKind,
    pub task: TaskInfo,
}

/// Download info for a completed task's result file
#[derive(Debug, Clone, Serialize)]
pub struct TaskDownload {
    pub file_path: PathBuf,
    pub download_filename: String,
}
