//! Task Orchestrator - serialized agent scheduling with live notifications
//!
//! ## Features
//!
//! - Single running slot with a priority wait queue
//! - Full task lifecycle (queue, start, pause, resume, cancel, complete, fail)
//! - Progress updates on two axes (items and bytes)
//! - Bounded completed-task history
//! - Event notifications for every mutation
//!
//! All mutating operations take one coarse lock, transition state, and
//! push their events onto the bus ring before releasing it. The ring
//! push never waits on subscribers (listener callbacks run on the bus
//! dispatch worker), so holding the lock across it is cheap and it is
//! what guarantees a subscriber never sees events for one task out of
//! lifecycle order.
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = TaskOrchestrator::new(OrchestratorConfig::default());
//!
//! let task = Task::new("downloads-organizer", AgentKind::Organization, "Tidy ~/Downloads")
//!     .with_priority(TaskPriority::High)
//!     .with_total_items(1200);
//! let id = orchestrator.submit(task).await?;
//!
//! // ... agent reports progress ...
//! orchestrator.update_progress(id, 600, Some("moving video files")).await;
//!
//! orchestrator.complete(id, true, None).await?;
//! ```

use crate::executor::{AgentExecutor, TaskHandle};
use crate::progress;
use crate::state::TaskStatus;
use crate::task::{AgentKind, Task, TaskId};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, trace, warn};
use warden_foundation::event::{self, EventBus, EventBusConfig, WardenEvent};
use warden_foundation::{Error, OrchestratorSettings, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Task Orchestrator Configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How many finished tasks to retain in history
    pub history_limit: usize,

    /// Event bus settings (used when the orchestrator owns its bus)
    pub event_bus: EventBusConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            event_bus: EventBusConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Derive from persisted settings
    pub fn from_settings(settings: &OrchestratorSettings) -> Self {
        Self {
            history_limit: settings.history_limit,
            event_bus: settings.event_bus_config(),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Aggregate counters for external status queries
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    /// Every task the service knows (live + retained history)
    pub total_tasks: usize,

    /// Tasks waiting in the queue
    pub queued: usize,

    /// Occupancy of the running slot (0 or 1)
    pub running: usize,

    /// Retained tasks that completed successfully
    pub completed: usize,

    /// Retained tasks that failed
    pub failed: usize,

    /// Retained tasks that were cancelled
    pub cancelled: usize,

    /// Registered agent executors
    pub registered_agents: usize,
}

// ============================================================================
// Inner state
// ============================================================================

/// Shared mutable state behind the orchestrator's single coarse lock
struct OrchestratorInner {
    /// Every known task: queued, running, and retained history
    tasks: HashMap<TaskId, Task>,

    /// Waiting task ids in submission order
    queue: VecDeque<TaskId>,

    /// The single running slot
    current: Option<TaskId>,

    /// Terminal task ids, oldest first
    history: VecDeque<TaskId>,

    /// Registered agent backends by kind
    executors: HashMap<AgentKind, Arc<dyn AgentExecutor>>,

    /// False once shutdown has begun
    accepting: bool,
}

impl OrchestratorInner {
    /// Move a terminal task into history, evicting the oldest past the limit
    fn retire(&mut self, id: TaskId, limit: usize) {
        self.history.push_back(id);
        while self.history.len() > limit {
            if let Some(evicted) = self.history.pop_front() {
                self.tasks.remove(&evicted);
                debug!("Evicted task {} from history", evicted);
            }
        }
    }

    /// Queue index of the next task to promote
    ///
    /// Highest priority wins; the earliest creation timestamp breaks
    /// ties, and queue position (submission order) breaks exact ties.
    fn next_queued(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, id) in self.queue.iter().enumerate() {
            let Some(candidate) = self.tasks.get(id) else {
                continue;
            };
            let leader = best
                .and_then(|b| self.queue.get(b))
                .and_then(|b| self.tasks.get(b));
            let better = match leader {
                None => true,
                Some(leader) => {
                    candidate.priority > leader.priority
                        || (candidate.priority == leader.priority
                            && candidate.created_at < leader.created_at)
                }
            };
            if better {
                best = Some(idx);
            }
        }
        best
    }
}

// ============================================================================
// Task Orchestrator
// ============================================================================

/// Task Orchestrator - owns every task for the process lifetime
///
/// Agent tasks contend for the same file-system resources, so the
/// orchestrator runs at most one at a time and queues the rest by
/// priority. Producers submit tasks, executors (or external drivers)
/// report progress and completion, and any number of subscribers watch
/// the three notification channels: `task.queued` once per task,
/// `task.updated` on every mutation, `task.completed` once on the
/// terminal transition.
///
/// Cheap to clone; clones share the same state and bus.
#[derive(Clone)]
pub struct TaskOrchestrator {
    /// Shared state
    inner: Arc<Mutex<OrchestratorInner>>,

    /// Notification bus
    bus: Arc<EventBus>,

    /// Configuration
    config: Arc<OrchestratorConfig>,
}

impl TaskOrchestrator {
    /// Create an orchestrator with its own event bus
    pub fn new(config: OrchestratorConfig) -> Self {
        let bus = Arc::new(EventBus::with_config(config.event_bus.clone()));
        Self::with_bus(config, bus)
    }

    /// Create an orchestrator publishing on an existing bus
    pub fn with_bus(config: OrchestratorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OrchestratorInner {
                tasks: HashMap::new(),
                queue: VecDeque::new(),
                current: None,
                history: VecDeque::new(),
                executors: HashMap::new(),
                accepting: true,
            })),
            bus,
            config: Arc::new(config),
        }
    }

    /// Create from persisted settings
    pub fn from_settings(settings: &OrchestratorSettings) -> Self {
        Self::new(OrchestratorConfig::from_settings(settings))
    }

    /// The bus this orchestrator publishes on
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Stream-style event subscription
    pub fn subscribe(&self) -> broadcast::Receiver<WardenEvent> {
        self.bus.receiver()
    }

    /// Register the agent backend for a kind, replacing any previous one
    pub async fn register_executor(&self, kind: AgentKind, executor: Arc<dyn AgentExecutor>) {
        let mut inner = self.inner.lock().await;
        info!(
            "Registered agent executor {} for kind {}",
            executor.name(),
            kind
        );
        if inner.executors.insert(kind, executor).is_some() {
            warn!("Replaced existing executor for kind {}", kind);
        }
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Submit a new task
    ///
    /// The task enters the queue and is promoted to running at once if
    /// the slot is free. Never blocks on other tasks.
    pub async fn submit(&self, mut task: Task) -> Result<TaskId> {
        let task_id = task.id;

        let mut inner = self.inner.lock().await;

        if !inner.accepting {
            return Err(Error::invalid_state(
                "submit",
                task_id.to_string(),
                "service is shut down",
            ));
        }
        if inner.tasks.contains_key(&task_id) {
            return Err(Error::InvalidArgument(format!(
                "task id {} already exists",
                task_id
            )));
        }
        if task.status != TaskStatus::Pending {
            return Err(Error::InvalidArgument(format!(
                "task {} must be submitted as pending, not {}",
                task_id,
                task.status.as_str()
            )));
        }

        task.enqueue();
        info!(
            "Queued task {} ({}): {}",
            task_id,
            task.kind.as_str(),
            task.agent_name
        );
        let snapshot = snapshot_of(&task);
        inner.tasks.insert(task_id, task);
        inner.queue.push_back(task_id);

        self.bus
            .publish(event::task::queued(&task_id.to_string(), snapshot))
            .await;

        self.promote_next(&mut inner).await;

        Ok(task_id)
    }

    /// Begin a specific queued task immediately
    ///
    /// Explicit "run now". Fails when the id is unknown, the task is
    /// not queued, or another task holds the running slot; callers
    /// wanting to jump the line must first finish or cancel the
    /// occupant.
    pub async fn start(&self, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock().await;

        let Some(task) = inner.tasks.get(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if task.status != TaskStatus::Queued {
            return Err(Error::invalid_state(
                "start",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }
        if inner.current.is_some() {
            return Err(Error::invalid_state(
                "start",
                id.to_string(),
                "another task is running",
            ));
        }

        inner.queue.retain(|queued| *queued != id);
        self.begin(&mut inner, id).await;
        Ok(())
    }

    /// Report item progress for a running task
    ///
    /// Calls against unknown or non-running tasks are benign no-ops:
    /// observability updates racing completion are expected and
    /// harmless.
    pub async fn update_progress(
        &self,
        id: TaskId,
        processed_items: u64,
        current_action: Option<&str>,
    ) {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            trace!("Progress update for unknown task {}", id);
            return;
        };
        if !task.status.is_running() {
            trace!(
                "Progress update for task {} ignored (status is {})",
                id,
                task.status.as_str()
            );
            return;
        }

        task.processed_items = processed_items;
        if let Some(action) = current_action {
            task.current_action = action.to_string();
        }
        let snapshot = snapshot_of(task);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;
    }

    /// Report byte progress for a running task
    ///
    /// Same no-op tolerance as [`update_progress`](Self::update_progress).
    pub async fn update_progress_bytes(
        &self,
        id: TaskId,
        processed_bytes: u64,
        current_action: Option<&str>,
    ) {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            trace!("Byte progress update for unknown task {}", id);
            return;
        };
        if !task.status.is_running() {
            trace!(
                "Byte progress update for task {} ignored (status is {})",
                id,
                task.status.as_str()
            );
            return;
        }

        task.processed_bytes = processed_bytes;
        if let Some(action) = current_action {
            task.current_action = action.to_string();
        }
        let snapshot = snapshot_of(task);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;
    }

    /// Record a per-item failure on a running task
    ///
    /// Appends to the error list and bumps the failed-item counter
    /// without ending the task. Same no-op tolerance as progress
    /// updates.
    pub async fn record_error(&self, id: TaskId, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            trace!("Error report for unknown task {}", id);
            return;
        };
        if !task.status.is_running() {
            trace!(
                "Error report for task {} ignored (status is {})",
                id,
                task.status.as_str()
            );
            return;
        }

        warn!("Task {} error: {}", id, message);
        task.errors.push(message);
        task.failed_items += 1;
        let snapshot = snapshot_of(task);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;
    }

    /// Pause a running task
    ///
    /// Advisory: the agent observes the pause through its handle and
    /// holds work until resumed. Fails unless the task is running and
    /// was created with pausing allowed.
    pub async fn pause(&self, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if !task.can_pause {
            return Err(Error::invalid_state(
                "pause",
                id.to_string(),
                "pausing is disabled",
            ));
        }
        if !task.status.can_transition_to(TaskStatus::Paused) {
            return Err(Error::invalid_state(
                "pause",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }

        task.pause();
        info!("Paused task {}", id);
        let snapshot = snapshot_of(task);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;
        Ok(())
    }

    /// Resume a paused task
    pub async fn resume(&self, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if !task.can_pause {
            return Err(Error::invalid_state(
                "resume",
                id.to_string(),
                "pausing is disabled",
            ));
        }
        if !task.status.is_paused() {
            return Err(Error::invalid_state(
                "resume",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }

        task.resume();
        info!("Resumed task {}", id);
        let snapshot = snapshot_of(task);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;
        Ok(())
    }

    /// Cancel a queued, running, or paused task
    ///
    /// Bookkeeping transitions immediately and the next queued task is
    /// promoted; an in-flight agent keeps running until it observes the
    /// signal through its handle. That window is the accepted cost of
    /// cooperative cancellation.
    pub async fn cancel(&self, id: TaskId, reason: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if task.status.is_terminal() {
            return Err(Error::invalid_state(
                "cancel",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }
        if !task.can_cancel {
            return Err(Error::invalid_state(
                "cancel",
                id.to_string(),
                "cancellation is disabled",
            ));
        }

        task.cancel(reason.map(str::to_string));
        let snapshot = snapshot_of(task);

        if inner.current == Some(id) {
            inner.current = None;
        }
        inner.queue.retain(|queued| *queued != id);
        inner.retire(id, self.config.history_limit);

        info!("Cancelled task {}", id);
        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot.clone()))
            .await;
        self.bus
            .publish(event::task::completed(
                &id.to_string(),
                TaskStatus::Cancelled.as_str(),
                snapshot,
            ))
            .await;

        self.promote_next(&mut inner).await;
        Ok(())
    }

    /// Mark a running task as successfully finished
    ///
    /// A `success == false` report routes to the failure path so the
    /// outcome still lands in failed state with its terminal
    /// notification.
    pub async fn complete(&self, id: TaskId, success: bool, message: Option<&str>) -> Result<()> {
        if !success {
            return self
                .fail(id, message.unwrap_or("task reported failure"))
                .await;
        }

        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if !task.status.can_transition_to(TaskStatus::Completed) {
            return Err(Error::invalid_state(
                "complete",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }

        if let Some(message) = message {
            task.current_action = message.to_string();
        }
        task.complete();
        let elapsed = task.elapsed();
        let snapshot = snapshot_of(task);

        if inner.current == Some(id) {
            inner.current = None;
        }
        inner.retire(id, self.config.history_limit);

        info!(
            "Completed task {} in {}",
            id,
            progress::format_clock(elapsed)
        );
        self.bus
            .publish(event::task::completed(
                &id.to_string(),
                TaskStatus::Completed.as_str(),
                snapshot,
            ))
            .await;

        self.promote_next(&mut inner).await;
        Ok(())
    }

    /// Mark a running task as failed, recording the error
    ///
    /// The failure lands on the task and in the terminal notification;
    /// the call itself succeeds.
    pub async fn fail(&self, id: TaskId, error_message: impl Into<String>) -> Result<()> {
        let error_message = error_message.into();
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Err(Error::NotFound(format!("Task {} not found", id)));
        };
        if !task.status.can_transition_to(TaskStatus::Failed) {
            return Err(Error::invalid_state(
                "fail",
                id.to_string(),
                format!("status is {}", task.status.as_str()),
            ));
        }

        warn!("Task {} failed: {}", id, error_message);
        task.fail(error_message);
        let snapshot = snapshot_of(task);

        if inner.current == Some(id) {
            inner.current = None;
        }
        inner.retire(id, self.config.history_limit);

        self.bus
            .publish(event::task::completed(
                &id.to_string(),
                TaskStatus::Failed.as_str(),
                snapshot,
            ))
            .await;

        self.promote_next(&mut inner).await;
        Ok(())
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// Get a task snapshot by id
    pub async fn get_task(&self, id: TaskId) -> Option<Task> {
        let inner = self.inner.lock().await;
        inner.tasks.get(&id).cloned()
    }

    /// The task occupying the running slot, if any
    pub async fn current_task(&self) -> Option<Task> {
        let inner = self.inner.lock().await;
        inner.current.and_then(|id| inner.tasks.get(&id).cloned())
    }

    /// Waiting tasks in submission order
    pub async fn queued_tasks(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        inner
            .queue
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    /// Every live task: the running slot occupant first, then the queue
    pub async fn active_tasks(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        let mut active = Vec::new();
        if let Some(task) = inner.current.and_then(|id| inner.tasks.get(&id)) {
            active.push(task.clone());
        }
        active.extend(
            inner
                .queue
                .iter()
                .filter_map(|id| inner.tasks.get(id).cloned()),
        );
        active
    }

    /// Retained terminal tasks, most recent first
    pub async fn completed_tasks(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        inner
            .history
            .iter()
            .rev()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    /// Number of tasks waiting in the queue
    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Whether the running slot is occupied
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.current.is_some()
    }

    /// Aggregate counters
    pub async fn stats(&self) -> OrchestratorStats {
        let inner = self.inner.lock().await;
        let mut completed = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
                TaskStatus::Cancelled => cancelled += 1,
                _ => {}
            }
        }
        OrchestratorStats {
            total_tasks: inner.tasks.len(),
            queued: inner.queue.len(),
            running: usize::from(inner.current.is_some()),
            completed,
            failed,
            cancelled,
            registered_agents: inner.executors.len(),
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop every retained terminal task
    ///
    /// Queued and active tasks are untouched. Returns how many were
    /// cleared.
    pub async fn clear_history(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let ids: Vec<TaskId> = inner.history.drain(..).collect();
        for id in &ids {
            inner.tasks.remove(id);
        }
        if !ids.is_empty() {
            debug!("Cleared {} tasks from history", ids.len());
        }
        ids.len()
    }

    /// Stop admissions and cancel everything still live
    ///
    /// Teardown overrides per-task `can_cancel`: an uncancellable task
    /// has no meaning once the service itself is going away. In-flight
    /// agents observe the cancellation through their handles. Safe to
    /// call more than once.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.accepting {
            return;
        }
        inner.accepting = false;

        let mut doomed: Vec<TaskId> = inner.queue.drain(..).collect();
        if let Some(id) = inner.current.take() {
            doomed.push(id);
        }

        info!(
            "Shutting down orchestrator; cancelling {} live tasks",
            doomed.len()
        );

        for id in doomed {
            let snapshot = match inner.tasks.get_mut(&id) {
                Some(task) => {
                    task.cancel(Some("orchestrator shutting down".to_string()));
                    snapshot_of(task)
                }
                None => continue,
            };
            inner.retire(id, self.config.history_limit);

            self.bus
                .publish(event::task::updated(&id.to_string(), snapshot.clone()))
                .await;
            self.bus
                .publish(event::task::completed(
                    &id.to_string(),
                    TaskStatus::Cancelled.as_str(),
                    snapshot,
                ))
                .await;
        }

        self.bus
            .publish(event::system::shutdown("orchestrator stopped"))
            .await;
    }

    // ========================================================================
    // Dispatch internals
    // ========================================================================

    /// Fill the running slot from the queue, if it is free
    ///
    /// Called with the state lock held, including from the tail of
    /// every terminal transition, which is what re-evaluates the queue
    /// the moment the slot frees up.
    async fn promote_next(&self, inner: &mut OrchestratorInner) {
        if inner.current.is_some() || !inner.accepting {
            return;
        }
        let Some(idx) = inner.next_queued() else {
            return;
        };
        let Some(id) = inner.queue.remove(idx) else {
            return;
        };
        self.begin(inner, id).await;
    }

    /// Transition a queued task into the running slot
    ///
    /// Caller has already removed the id from the queue and verified
    /// the slot is free.
    async fn begin(&self, inner: &mut OrchestratorInner, id: TaskId) {
        let Some(task) = inner.tasks.get_mut(&id) else {
            return;
        };
        task.start();
        let kind = task.kind;
        let agent_name = task.agent_name.clone();
        let snapshot = snapshot_of(task);

        inner.current = Some(id);
        info!("Promoted task {} to running: {}", id, agent_name);

        self.bus
            .publish(event::task::updated(&id.to_string(), snapshot))
            .await;

        match inner.executors.get(&kind) {
            Some(executor) if executor.is_available() => {
                self.spawn_runner(id, Arc::clone(executor));
            }
            Some(executor) => {
                warn!(
                    "Executor {} for kind {} is unavailable; task {} awaits external completion",
                    executor.name(),
                    kind,
                    id
                );
            }
            None => {
                debug!(
                    "No executor registered for kind {}; task {} awaits external completion",
                    kind, id
                );
            }
        }
    }

    /// Drive a registered executor for one task on a background worker
    fn spawn_runner(&self, id: TaskId, executor: Arc<dyn AgentExecutor>) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let handle = TaskHandle::new(id, orchestrator.clone());
            debug!("Agent {} starting task {}", executor.name(), id);
            let outcome = executor.run(handle).await;

            // The task may already be terminal (cancelled, or finished by
            // the agent through its handle); the late transition attempt
            // is rejected inside complete/fail.
            let settled = match outcome {
                Ok(()) => orchestrator.complete(id, true, None).await,
                Err(e) => orchestrator.fail(id, e.to_string()).await,
            };
            if let Err(e) = settled {
                debug!("Task {} settled before its runner returned: {}", id, e);
            }
        });
    }
}

impl Default for TaskOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

/// Serialize a task snapshot for event payloads
fn snapshot_of(task: &Task) -> serde_json::Value {
    serde_json::to_value(task).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// Tests
// ============================================================================
