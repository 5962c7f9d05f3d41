//! Config - orchestrator settings
//!
//! Operator-tunable knobs for the orchestration service, persisted as
//! JSON through [`JsonStore`]. A project-local file overrides the global
//! one when present.

use crate::event::EventBusConfig;
use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Settings file name
pub const SETTINGS_FILE: &str = "orchestrator.json";

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// How many finished tasks to retain in history
    pub history_limit: usize,
    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
    /// How many events the bus keeps for inspection
    pub event_history_size: usize,
    /// Log every event as it is published
    pub debug_events: bool,
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            event_channel_capacity: 1024,
            event_history_size: 100,
            debug_events: false,
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorSettings {
    /// Development profile (verbose, larger history)
    pub fn development() -> Self {
        Self {
            history_limit: 500,
            event_channel_capacity: 4096,
            event_history_size: 500,
            debug_events: true,
            log_level: "debug".to_string(),
        }
    }

    /// Derive the event bus settings
    pub fn event_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            // broadcast channels reject zero capacity
            channel_capacity: self.event_channel_capacity.max(1),
            history_size: self.event_history_size,
            debug_mode: self.debug_events,
        }
    }

    /// Load global settings
    pub fn load_global() -> Result<Self> {
        let store = JsonStore::global()?;
        Ok(store.load_or_default(SETTINGS_FILE))
    }

    /// Load project settings if the file exists
    pub fn load_project() -> Result<Option<Self>> {
        let store = JsonStore::current_project()?;
        store.load_optional(SETTINGS_FILE)
    }

    /// Load settings (project overrides global when present)
    pub fn load() -> Result<Self> {
        let global = Self::load_global().unwrap_or_default();
        let project = Self::load_project().ok().flatten();
        Ok(project.unwrap_or(global))
    }

    /// Save global settings
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(SETTINGS_FILE, self)
    }

    /// Save project settings
    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(SETTINGS_FILE, self)
    }
}
