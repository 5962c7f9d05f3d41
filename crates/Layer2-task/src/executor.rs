//! Agent executor seam
//!
//! The orchestrator schedules work but never implements it. An agent
//! implementation registers an [`AgentExecutor`] per [`AgentKind`]; when
//! a task of that kind is promoted to Running, the orchestrator hands
//! the executor a [`TaskHandle`] and lets it drive progress through the
//! service API. Pause and cancel are cooperative: the executor is
//! expected to poll the handle between units of work.

use crate::orchestrator::TaskOrchestrator;
use crate::task::{Task, TaskId};
use async_trait::async_trait;
use warden_foundation::Result;

/// Executor trait - implement to plug in an agent backend
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the unit of work for one task
    ///
    /// Returning `Ok` completes the task; returning `Err` fails it with
    /// the error message. An executor that already completed, failed, or
    /// observed cancellation through the handle may return either way;
    /// the late transition is dropped.
    async fn run(&self, handle: TaskHandle) -> Result<()>;

    /// Check if the executor is available
    fn is_available(&self) -> bool {
        true
    }

    /// Get executor name
    fn name(&self) -> &'static str;
}

/// Accessor an executor uses to report progress and observe signals
///
/// Cheap to clone; every method resolves against the orchestrator's
/// live state, so a handle held past task completion simply sees the
/// terminal snapshot.
#[derive(Clone)]
pub struct TaskHandle {
    task_id: TaskId,
    orchestrator: TaskOrchestrator,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, orchestrator: TaskOrchestrator) -> Self {
        Self {
            task_id,
            orchestrator,
        }
    }

    /// The task this handle drives
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Snapshot of the task, if it is still known to the service
    pub async fn task(&self) -> Option<Task> {
        self.orchestrator.get_task(self.task_id).await
    }

    /// Report item progress (no-op unless the task is Running)
    pub async fn update_progress(&self, processed_items: u64, current_action: Option<&str>) {
        self.orchestrator
            .update_progress(self.task_id, processed_items, current_action)
            .await;
    }

    /// Report byte progress (no-op unless the task is Running)
    pub async fn update_progress_bytes(&self, processed_bytes: u64, current_action: Option<&str>) {
        self.orchestrator
            .update_progress_bytes(self.task_id, processed_bytes, current_action)
            .await;
    }

    /// Record a per-item failure without ending the task
    pub async fn record_error(&self, message: impl Into<String>) {
        self.orchestrator.record_error(self.task_id, message).await;
    }

    /// Finish the task successfully
    pub async fn complete(&self, message: Option<&str>) -> Result<()> {
        self.orchestrator.complete(self.task_id, true, message).await
    }

    /// Finish the task as failed
    pub async fn fail(&self, error_message: impl Into<String>) -> Result<()> {
        self.orchestrator.fail(self.task_id, error_message).await
    }

    /// Whether the executor should stop work
    ///
    /// True once the task is cancelled, otherwise terminal, or evicted.
    /// Honoring this promptly is what makes cancellation effective; the
    /// service's bookkeeping has already moved on either way.
    pub async fn is_cancel_requested(&self) -> bool {
        match self.task().await {
            Some(task) => task.status.is_terminal(),
            None => true,
        }
    }

    /// Whether the executor should hold work until resumed
    pub async fn is_pause_requested(&self) -> bool {
        match self.task().await {
            Some(task) => task.status.is_paused(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorConfig, TaskOrchestrator};
    use crate::task::AgentKind;

    #[tokio::test]
    async fn test_handle_reflects_live_state() {
        let orchestrator = TaskOrchestrator::new(OrchestratorConfig::default());
        let task = Task::new("scanner", AgentKind::Discovery, "scan").with_total_items(10);
        let id = orchestrator.submit(task).await.unwrap();

        let handle = TaskHandle::new(id, orchestrator.clone());
        assert!(!handle.is_cancel_requested().await);
        assert!(!handle.is_pause_requested().await);

        handle.update_progress(4, Some("scanning")).await;
        let task = handle.task().await.unwrap();
        assert_eq!(task.processed_items, 4);
        assert_eq!(task.current_action, "scanning");

        orchestrator.pause(id).await.unwrap();
        assert!(handle.is_pause_requested().await);

        orchestrator.resume(id).await.unwrap();
        orchestrator.cancel(id, Some("test over")).await.unwrap();
        assert!(handle.is_cancel_requested().await);
    }

    #[tokio::test]
    async fn test_handle_for_evicted_task_requests_cancel() {
        let orchestrator = TaskOrchestrator::new(OrchestratorConfig::default());
        let handle = TaskHandle::new(TaskId::new(), orchestrator);
        assert!(handle.is_cancel_requested().await);
        assert!(handle.task().await.is_none());
    }
}
