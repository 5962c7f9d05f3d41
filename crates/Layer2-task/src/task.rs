//! Task definition and types

use crate::progress;
use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Category of agent work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// Walk directories and catalogue what exists
    Discovery,
    /// Assign files to categories
    Classification,
    /// Move files into a target layout
    Organization,
    /// Remove unwanted files
    Cleanup,
    /// Locate files matching a query
    Search,
    /// Watch directories for changes
    Monitoring,
    /// Rename many files in one pass
    BatchRename,
    /// Find duplicate content
    DuplicateDetection,
    /// Reclaim disk space
    SpaceRecovery,
    /// Copy files to a backup target
    Backup,
    /// Restore files from a backup
    Restore,
}

impl AgentKind {
    /// Kind string (matches the serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Classification => "classification",
            Self::Organization => "organization",
            Self::Cleanup => "cleanup",
            Self::Search => "search",
            Self::Monitoring => "monitoring",
            Self::BatchRename => "batch-rename",
            Self::DuplicateDetection => "duplicate-detection",
            Self::SpaceRecovery => "space-recovery",
            Self::Backup => "backup",
            Self::Restore => "restore",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling priority
///
/// Ordering is derived from declaration order, so `Critical` compares
/// greater than `High` and the dispatcher can pick a queue candidate
/// with a plain max comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of agent work with tracked progress
///
/// Identity is fixed at creation; state and counters mutate in place
/// while the orchestrator drives the task through its lifecycle.
/// Progress is tracked on two independent axes because some agents
/// measure work in files and others in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,

    /// Agent name (free text, e.g. "Duplicate scanner")
    pub agent_name: String,

    /// Category of work
    pub kind: AgentKind,

    /// Human-readable description of the work
    pub description: String,

    /// What the agent is doing right now (updated during execution)
    pub current_action: String,

    /// Scheduling priority
    pub priority: TaskPriority,

    /// Current state
    pub status: TaskStatus,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task started running (set once, survives pause/resume)
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Total items the agent expects to process
    pub total_items: u64,

    /// Items processed so far
    pub processed_items: u64,

    /// Items that failed processing
    pub failed_items: u64,

    /// Total bytes the agent expects to process
    pub total_bytes: u64,

    /// Bytes processed so far
    pub processed_bytes: u64,

    /// Errors accumulated during execution, in occurrence order
    pub errors: Vec<String>,

    /// Why the task was cancelled, if it was
    pub cancellation_reason: Option<String>,

    /// Agent-specific extra data
    pub metadata: HashMap<String, serde_json::Value>,

    /// Whether this task may be paused
    pub can_pause: bool,

    /// Whether this task may be cancelled
    pub can_cancel: bool,
}

impl Task {
    /// Create a new task in the Pending state
    pub fn new(
        agent_name: impl Into<String>,
        kind: AgentKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            agent_name: agent_name.into(),
            kind,
            description: description.into(),
            current_action: String::new(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_items: 0,
            processed_items: 0,
            failed_items: 0,
            total_bytes: 0,
            processed_bytes: 0,
            errors: Vec::new(),
            cancellation_reason: None,
            metadata: HashMap::new(),
            can_pause: true,
            can_cancel: true,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the expected item count
    pub fn with_total_items(mut self, total: u64) -> Self {
        self.total_items = total;
        self
    }

    /// Set the expected byte count
    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = total;
        self
    }

    /// Set whether the task may be paused
    pub fn with_can_pause(mut self, can_pause: bool) -> Self {
        self.can_pause = can_pause;
        self
    }

    /// Set whether the task may be cancelled
    pub fn with_can_cancel(mut self, can_cancel: bool) -> Self {
        self.can_cancel = can_cancel;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    // ========================================================================
    // Transition mutators (guards live in the orchestrator)
    // ========================================================================

    /// Mark the task as queued
    pub fn enqueue(&mut self) {
        self.status = TaskStatus::Queued;
    }

    /// Mark the task as running
    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        // set once; promotion happens at most once per task
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the task as paused
    pub fn pause(&mut self) {
        self.status = TaskStatus::Paused;
    }

    /// Mark the task as running again after a pause
    pub fn resume(&mut self) {
        self.status = TaskStatus::Running;
    }

    /// Mark the task as completed successfully
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as failed, recording the error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as cancelled
    pub fn cancel(&mut self, reason: Option<String>) {
        self.cancellation_reason = reason;
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Check if the task is still live (queued, running, or paused)
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    // ========================================================================
    // Derived metrics (computed on read, never stored)
    // ========================================================================

    /// Item progress as a percentage in [0, 100], one decimal place
    ///
    /// Zero while `total_items` is zero. Over-counted progress reports
    /// are clamped rather than surfaced beyond 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        let pct = (self.processed_items as f64 / self.total_items as f64) * 100.0;
        (pct.clamp(0.0, 100.0) * 10.0).round() / 10.0
    }

    /// Byte progress as a percentage in [0, 100], one decimal place
    pub fn byte_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let pct = (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0;
        (pct.clamp(0.0, 100.0) * 10.0).round() / 10.0
    }

    /// Time spent running: zero before start, frozen once terminal
    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            None => Duration::ZERO,
            Some(start) => {
                let end = self.completed_at.unwrap_or_else(Utc::now);
                (end - start).to_std().unwrap_or_default()
            }
        }
    }

    /// Linear-rate estimate of the time remaining
    ///
    /// None until the task has started and made countable progress.
    /// This is a straight extrapolation from the average rate so far,
    /// not a smoothed estimator; bursty agents will see it jump around.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        self.started_at?;
        if self.processed_items == 0 || self.total_items == 0 {
            return None;
        }

        let elapsed_secs = self.elapsed().as_secs_f64();
        if elapsed_secs <= 0.0 {
            return None;
        }

        let rate = self.processed_items as f64 / elapsed_secs;
        if rate <= 0.0 {
            return None;
        }

        let remaining = self.total_items.saturating_sub(self.processed_items) as f64;
        let secs = remaining / rate;
        if !secs.is_finite() {
            return None;
        }
        Some(Duration::from_secs_f64(secs))
    }

    // ========================================================================
    // Formatted text (for presentation layers)
    // ========================================================================

    /// "processed / total" item counter text
    pub fn progress_text(&self) -> String {
        progress::progress_text(self.processed_items, self.total_items)
    }

    /// Elapsed time as MM:SS (or HH:MM:SS past an hour)
    pub fn elapsed_text(&self) -> String {
        progress::format_clock(self.elapsed())
    }

    /// Estimated remaining time, "--:--" while undefined
    pub fn eta_text(&self) -> String {
        progress::eta_text(self.estimated_remaining())
    }
}
