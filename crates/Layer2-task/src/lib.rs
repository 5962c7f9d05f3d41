//! # warden-task
//!
//! Task orchestration core for FileWarden agents.
//! Handles the task lifecycle, single-slot priority scheduling, progress
//! tracking, and live notifications for long-running file operations.
//!
//! ## Features
//!
//! - Task entity with state machine and capability flags
//! - Priority dispatch through a single running slot
//! - Derived progress metrics (percentages, elapsed, ETA)
//! - Cooperative pause and cancellation through task handles
//! - Pluggable agent executors per task kind
//! - **Per-task ordered event notifications**
//! - **Bounded completed-task history**

pub mod executor;
pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod task;

// Task system
pub use orchestrator::{OrchestratorConfig, OrchestratorStats, TaskOrchestrator};
pub use state::TaskStatus;
pub use task::{AgentKind, Task, TaskId, TaskPriority};

// Executor system
pub use executor::{AgentExecutor, TaskHandle};

// Progress formatting
pub use progress::{eta_text, format_bytes, format_clock, progress_text};
