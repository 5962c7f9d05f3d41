//! # warden-foundation
//!
//! Foundation layer for FileWarden:
//! - Error: central error type and Result alias
//! - Event: publish/subscribe notification bus
//! - Config: orchestrator settings (global + project JSON)
//! - Storage: JsonStore for settings files
//! - Logging: tracing subscriber setup
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Orchestration Service (warden-task)                    │
//! │                     │                                   │
//! │                     ▼                                   │
//! │          EventBus (queued/updated/completed)            │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   Listeners (UI, log)   broadcast receivers            │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{OrchestratorSettings, SETTINGS_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Event
// ============================================================================
pub use event::{
    // Global
    global_event_bus,
    init_global_event_bus,
    // Bus
    EventBus,
    EventBusConfig,
    // Types
    EventCategory,
    EventFilter,
    EventId,
    EventListener,
    EventSeverity,
    ListenerId,
    WardenEvent,
};

// ============================================================================
// Logging
// ============================================================================
pub use logging::{init_logging, try_init_logging};
