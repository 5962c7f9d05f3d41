//! Event Types - event definitions shared across all layers
//!
//! Every notification FileWarden emits flows through these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Event ID
// ============================================================================

/// Unique event ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Generate a new event ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Build from an existing string
    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event Category
// ============================================================================

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// System events (startup, shutdown, settings changes)
    System,
    /// Task lifecycle events
    Task,
    /// Agent-layer events (emitted by agent implementations)
    Agent,
    /// Error events
    Error,
    /// User-defined events
    Custom,
}

impl EventCategory {
    /// Category string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Task => "task",
            Self::Agent => "agent",
            Self::Error => "error",
            Self::Custom => "custom",
        }
    }
}

// ============================================================================
// Event Severity
// ============================================================================

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    /// Debug information
    Debug,
    /// Normal information
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Critical error
    Critical,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl Default for EventSeverity {
    fn default() -> Self {
        Self::Info
    }
}

// ============================================================================
// WardenEvent - core event type
// ============================================================================

/// FileWarden system event
///
/// Common structure for events raised anywhere in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenEvent {
    /// Event ID
    pub id: EventId,

    /// Event type (e.g. "task.queued", "task.completed")
    pub event_type: String,

    /// Event category
    pub category: EventCategory,

    /// Severity
    pub severity: EventSeverity,

    /// When the event was raised
    pub timestamp: DateTime<Utc>,

    /// Event source (layer/module)
    pub source: String,

    /// Task ID the event concerns (if any)
    pub task_id: Option<String>,

    /// Event payload
    pub data: Value,

    /// Additional metadata
    pub metadata: HashMap<String, Value>,
}

impl WardenEvent {
    /// Create a new event
    pub fn new(event_type: impl Into<String>, category: EventCategory) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            category,
            severity: EventSeverity::Info,
            timestamp: Utc::now(),
            source: String::new(),
            task_id: None,
            data: Value::Null,
            metadata: HashMap::new(),
        }
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the task ID
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Set the payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Predefined event types
// ============================================================================

/// System events
pub mod system {
    use super::*;

    /// System startup event
    pub fn started(version: &str) -> WardenEvent {
        WardenEvent::new("system.started", EventCategory::System)
            .with_source("warden")
            .with_data(serde_json::json!({
                "version": version,
            }))
    }

    /// System shutdown event
    pub fn shutdown(reason: &str) -> WardenEvent {
        WardenEvent::new("system.shutdown", EventCategory::System)
            .with_source("warden")
            .with_data(serde_json::json!({
                "reason": reason,
            }))
    }
}

/// Task lifecycle events
///
/// A task's events are always delivered in lifecycle order:
/// `task.queued` once, `task.updated` zero or more times, then
/// `task.completed` once when the task reaches a terminal state.
/// The payload carries a full snapshot of the task at emission time,
/// so subscribers never need a follow-up query to render it.
pub mod task {
    use super::*;

    /// Task accepted into the queue (fires exactly once per task)
    pub fn queued(task_id: &str, snapshot: Value) -> WardenEvent {
        WardenEvent::new("task.queued", EventCategory::Task)
            .with_source("orchestrator")
            .with_task(task_id)
            .with_data(snapshot)
    }

    /// Task mutated (state, progress counters, diagnostics)
    pub fn updated(task_id: &str, snapshot: Value) -> WardenEvent {
        WardenEvent::new("task.updated", EventCategory::Task)
            .with_source("orchestrator")
            .with_task(task_id)
            .with_data(snapshot)
    }

    /// Task reached a terminal state (fires exactly once per task)
    ///
    /// Severity reflects the outcome: completed is Info, cancelled is
    /// Warning, failed is Error.
    pub fn completed(task_id: &str, final_state: &str, snapshot: Value) -> WardenEvent {
        let severity = match final_state {
            "failed" => EventSeverity::Error,
            "cancelled" => EventSeverity::Warning,
            _ => EventSeverity::Info,
        };
        WardenEvent::new("task.completed", EventCategory::Task)
            .with_severity(severity)
            .with_source("orchestrator")
            .with_task(task_id)
            .with_data(snapshot)
            .with_metadata("final_state", serde_json::json!(final_state))
    }
}

// ============================================================================
// Tests
// ============================================================================
