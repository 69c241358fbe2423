use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{JimakuError, Result};

use super::{
    TaskDownload, TaskEvent, TaskEventKind, TaskInfo, TaskKind, TaskOutcome, TaskResult,
    TaskStatus,
};

/// Broadcast channel capacity; lagged subscribers skip events
const BROADCAST_CAPACITY: usize = 256;

/// In-memory background task manager.
///
/// Status transitions are pending -> running -> completed/failed/cancelled,
/// progress stays within [0, 100], and every state change is broadcast after
/// the task map has been updated.
pub struct TaskManager {
    tasks: RwLock<HashMap<Uuid, TaskInfo>>,
    running: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    events: broadcast::Sender<TaskEvent>,
    retention: Duration,
}

impl TaskManager {
    pub fn new(retention: Duration) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tasks: RwLock::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            events,
            retention,
        }
    }

    /// Subscribe to task events (WebSocket/SSE fan-out)
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    fn broadcast(&self, kind: TaskEventKind, task: TaskInfo) {
        // No subscribers is fine
        let _ = self.events.send(TaskEvent { kind, task });
    }

    /// Register a new pending task
    pub async fn create(&self, kind: TaskKind, original_filename: Option<String>) -> Uuid {
        let id = Uuid::new_v4();
        let info = TaskInfo {
            id,
            kind,
            status: TaskStatus::Pending,
            progress: 0.0,
            message: String::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            original_filename,
            result: None,
            error: None,
        };

        self.tasks.write().await.insert(id, info.clone());
        info!("Created task {} ({:?})", id, kind);
        self.broadcast(TaskEventKind::Created, info);
        id
    }

    /// Start a pending task in the background.
    ///
    /// The work closure receives a [`TaskHandle`] for progress reporting and
    /// resolves to a [`TaskOutcome`]; the manager records completion/failure
    /// and keeps the join handle around so the task can be cancelled.
    pub async fn start<F, Fut>(self: Arc<Self>, id: Uuid, work: F) -> Result<()>
    where
        F: FnOnce(TaskHandle) -> Fut,
        Fut: Future<Output = Result<TaskOutcome>> + Send + 'static,
    {
        {
            let mut tasks = self.tasks.write().await;
            let info = tasks
                .get_mut(&id)
                .ok_or_else(|| JimakuError::TaskNotFound(id.to_string()))?;
            if info.status != TaskStatus::Pending {
                return Err(JimakuError::TaskState(format!(
                    "task {} is {:?}, expected pending",
                    id, info.status
                )));
            }
            info.status = TaskStatus::Running;
            info.started_at = Some(Utc::now());
            info.message = "Task started".to_string();
        }

        let handle = TaskHandle {
            id,
            manager: Arc::clone(&self),
        };
        let manager = Arc::clone(&self);
        let future = work(handle);

        let join = tokio::spawn(async move {
            let outcome = future.await;
            manager.finish(id, outcome).await;
            manager.running.lock().await.remove(&id);
        });

        self.running.lock().await.insert(id, join);
        info!("Started task {}", id);
        Ok(())
    }

    /// Record the terminal state of a finished task
    async fn finish(&self, id: Uuid, outcome: Result<TaskOutcome>) {
        let (event, snapshot) = {
            let mut tasks = self.tasks.write().await;
            let Some(info) = tasks.get_mut(&id) else {
                return;
            };
            // A concurrent cancel may have already settled the task
            if info.status.is_terminal() {
                return;
            }

            let event = match outcome {
                Ok(result) => {
                    info.status = TaskStatus::Completed;
                    info.progress = 100.0;
                    info.message = "Task completed".to_string();
                    let download_filename = derive_download_filename(
                        info.original_filename.as_deref(),
                        result.output_file.as_deref(),
                    );
                    info.result = Some(TaskResult {
                        output_file: result.output_file,
                        download_filename,
                        detail: result.detail,
                    });
                    info!("Task completed: {}", id);
                    TaskEventKind::Completed
                }
                Err(e) => {
                    info.status = TaskStatus::Failed;
                    info.error = Some(e.to_string());
                    info.message = format!("Task failed: {}", e);
                    warn!("Task failed: {} - {}", id, e);
                    TaskEventKind::Failed
                }
            };
            info.completed_at = Some(Utc::now());
            (event, info.clone())
        };
        self.broadcast(event, snapshot);
    }

    /// Update progress from inside a running task
    async fn report_progress(&self, id: Uuid, progress: f32, message: &str) {
        let snapshot = {
            let mut tasks = self.tasks.write().await;
            let Some(info) = tasks.get_mut(&id) else {
                return;
            };
            if info.status != TaskStatus::Running {
                return;
            }
            info.progress = progress.clamp(0.0, 100.0);
            if !message.is_empty() {
                info.message = message.to_string();
            }
            info.clone()
        };
        debug!("Task {} progress: {:.1}% - {}", id, snapshot.progress, message);
        self.broadcast(TaskEventKind::Progress, snapshot);
    }

    /// Cancel a running task. Returns false when the task does not exist or
    /// is not running.
    pub async fn cancel(&self, id: Uuid) -> bool {
        {
            let tasks = self.tasks.read().await;
            match tasks.get(&id) {
                Some(info) if info.status == TaskStatus::Running => {}
                _ => return false,
            }
        }

        if let Some(join) = self.running.lock().await.remove(&id) {
            join.abort();
        }

        let snapshot = {
            let mut tasks = self.tasks.write().await;
            let Some(info) = tasks.get_mut(&id) else {
                return false;
            };
            // The work future may have settled while the abort was in flight
            if info.status != TaskStatus::Running {
                return false;
            }
            info.status = TaskStatus::Cancelled;
            info.completed_at = Some(Utc::now());
            info.message = "Task cancelled".to_string();
            info.clone()
        };
        info!("Task cancelled: {}", id);
        self.broadcast(TaskEventKind::Cancelled, snapshot);
        true
    }

    pub async fn get(&self, id: Uuid) -> Option<TaskInfo> {
        self.tasks.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<_> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub async fn running(&self) -> Vec<TaskInfo> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .cloned()
            .collect()
    }

    /// Drop a task entry. Running tasks must be cancelled first.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            None => Err(JimakuError::TaskNotFound(id.to_string())),
            Some(info) if info.status == TaskStatus::Running => Err(JimakuError::TaskState(
                "cannot remove a running task".to_string(),
            )),
            Some(_) => {
                tasks.remove(&id);
                info!("Removed task {}", id);
                Ok(())
            }
        }
    }

    /// Download info for a completed task's result file
    pub async fn download_info(&self, id: Uuid) -> Option<TaskDownload> {
        let tasks = self.tasks.read().await;
        let info = tasks.get(&id)?;
        if info.status != TaskStatus::Completed {
            return None;
        }
        let result = info.result.as_ref()?;
        let file_path = result.output_file.clone()?;
        let download_filename = result
            .download_filename
            .clone()
            .or_else(|| {
                file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })?;
        Some(TaskDownload {
            file_path,
            download_filename,
        })
    }

    /// Remove terminal tasks older than the retention window, returning how
    /// many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, info| {
            !(info.status.is_terminal()
                && info.completed_at.map(|t| t <= cutoff).unwrap_or(false))
        });
        let removed = before - tasks.len();
        if removed > 0 {
            info!("Cleaned up {} expired tasks", removed);
        }
        removed
    }

    /// Periodic maintenance: expired task retention plus a stale sweep of the
    /// temp directory, so crashed tasks do not leak intermediate files.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, temp_dir: PathBuf) -> JoinHandle<()> {
        let manager = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.cleanup_expired().await;
                if let Err(e) = crate::tempfiles::sweep_stale(&temp_dir, manager.retention) {
                    warn!("Temp directory sweep failed: {}", e);
                }
            }
        })
    }
}

/// Progress reporter handed to running task bodies
#[derive(Clone)]
pub struct TaskHandle {
    id: Uuid,
    manager: Arc<TaskManager>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn progress(&self, progress: f32, message: impl AsRef<str>) {
        self.manager
            .report_progress(self.id, progress, message.as_ref())
            .await;
    }
}

#[async_trait::async_trait]
impl super::ProgressSink for TaskHandle {
    async fn report(&self, progress: f32, message: &str) {
        self.progress(progress, message).await;
    }
}

/// Keep the original filename visible in the browser download: take its stem
/// and append `_subtitles` plus the result file's extension.
fn derive_download_filename(
    original_filename: Option<&str>,
    output_file: Option<&Path>,
) -> Option<String> {
    let output = output_file?;
    match original_filename {
        Some(original) => {
            let stem = Path::new(original)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| original.to_string());
            let ext = output
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| ".srt".to_string());
            Some(format!("{}_subtitles{}", stem, ext))
        }
        None => output
            .file_name()
            .map(|n| n.to_string_lossy().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn manager() -> Arc<TaskManager> {
        Arc::new(TaskManager::new(Duration::from_secs(86400)))
    }

    #[tokio::test]
    async fn task_runs_to_completion() {
        let manager = manager();
        let id = manager
            .create(TaskKind::GenerateFromFile, Some("movie.mp4".to_string()))
            .await;
        assert_eq!(manager.get(id).await.unwrap().status, TaskStatus::Pending);

        manager
            .clone()
            .start(id, |handle| async move {
                handle.progress(50.0, "halfway").await;
                Ok(TaskOutcome {
                    output_file: Some(PathBuf::from("/tmp/movie.srt")),
                    detail: None,
                })
            })
            .await
            .unwrap();

        // Wait for the background task to settle
        for _ in 0..50 {
            if manager.get(id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let info = manager.get(id).await.unwrap();
        assert_eq!(info.status, TaskStatus::Completed);
        assert_eq!(info.progress, 100.0);
        assert!(info.completed_at.is_some());
        let result = info.result.unwrap();
        assert_eq!(
            result.download_filename.as_deref(),
            Some("movie_subtitles.srt")
        );
    }

    #[tokio::test]
    async fn failed_task_records_error() {
        let manager = manager();
        let id = manager.create(TaskKind::Translate, None).await;
        manager
            .clone()
            .start(id, |_| async move {
                Err(JimakuError::Translation("service unavailable".to_string()))
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if manager.get(id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let info = manager.get(id).await.unwrap();
        assert_eq!(info.status, TaskStatus::Failed);
        assert!(info.error.unwrap().contains("service unavailable"));
    }

    #[tokio::test]
    async fn cancel_aborts_running_task() {
        let manager = manager();
        let id = manager.create(TaskKind::Download, None).await;
        manager
            .clone()
            .start(id, |_| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(TaskOutcome::default())
            })
            .await
            .unwrap();

        assert!(manager.cancel(id).await);
        let info = manager.get(id).await.unwrap();
        assert_eq!(info.status, TaskStatus::Cancelled);
        assert!(info.completed_at.is_some());

        // Second cancel is a no-op
        assert!(!manager.cancel(id).await);
    }

    #[tokio::test]
    async fn cancel_does_not_overwrite_completed_task() {
        let manager = manager();
        let id = manager.create(TaskKind::Translate, None).await;
        manager
            .clone()
            .start(id, |_| async move {
                Ok(TaskOutcome {
                    output_file: Some(PathBuf::from("/tmp/done.srt")),
                    detail: None,
                })
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if manager.get(id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // the completed state must win over a late cancel
        assert!(!manager.cancel(id).await);
        let info = manager.get(id).await.unwrap();
        assert_eq!(info.status, TaskStatus::Completed);
        assert!(info.result.is_some());
    }

    #[tokio::test]
    async fn cancel_unknown_task_returns_false() {
        let manager = manager();
        assert!(!manager.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn start_requires_pending_status() {
        let manager = manager();
        let id = manager.create(TaskKind::Burn, None).await;
        manager
            .clone()
            .start(id, |_| async move { Ok(TaskOutcome::default()) })
            .await
            .unwrap();
        let err = manager
            .clone()
            .start(id, |_| async move { Ok(TaskOutcome::default()) })
            .await
            .unwrap_err();
        assert!(matches!(err, JimakuError::TaskState(_)));
    }

    #[tokio::test]
    async fn progress_is_clamped() {
        let manager = manager();
        let id = manager.create(TaskKind::GenerateFromUrl, None).await;
        manager
            .clone()
            .start(id, |handle| async move {
                handle.progress(250.0, "overshoot").await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(TaskOutcome::default())
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let info = manager.get(id).await.unwrap();
        assert_eq!(info.progress, 100.0);
        assert_eq!(info.status, TaskStatus::Running);
        manager.cancel(id).await;
    }

    #[tokio::test]
    async fn events_are_broadcast_in_order() {
        let manager = manager();
        let mut rx = manager.subscribe();
        let id = manager.create(TaskKind::Translate, None).await;
        manager
            .clone()
            .start(id, |handle| async move {
                handle.progress(40.0, "translating").await;
                Ok(TaskOutcome::default())
            })
            .await
            .unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.kind, TaskEventKind::Created);
        let progress = rx.recv().await.unwrap();
        assert_eq!(progress.kind, TaskEventKind::Progress);
        assert_eq!(progress.task.progress, 40.0);
        let done = rx.recv().await.unwrap();
        assert_eq!(done.kind, TaskEventKind::Completed);
    }

    #[tokio::test]
    async fn retention_sweeper_removes_expired_tasks() {
        let manager = Arc::new(TaskManager::new(Duration::ZERO));
        let id = manager.create(TaskKind::Download, None).await;
        manager
            .clone()
            .start(id, |_| async move { Ok(TaskOutcome::default()) })
            .await
            .unwrap();

        for _ in 0..50 {
            if manager.get(id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(manager.cleanup_expired().await, 1);
        assert!(manager.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sweeper_removes_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("orphaned.wav");
        std::fs::write(&stale, b"x").unwrap();

        let manager = Arc::new(TaskManager::new(Duration::ZERO));
        let sweeper = manager
            .clone()
            .spawn_sweeper(Duration::from_millis(10), dir.path().to_path_buf());

        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!stale.exists());
        sweeper.abort();
    }

    #[tokio::test]
    async fn remove_rejects_running_tasks() {
        let manager = manager();
        let id = manager.create(TaskKind::Burn, None).await;
        manager
            .clone()
            .start(id, |_| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(TaskOutcome::default())
            })
            .await
            .unwrap();

        assert!(manager.remove(id).await.is_err());
        manager.cancel(id).await;
        manager.remove(id).await.unwrap();
        assert!(manager.get(id).await.is_none());
    }
}
