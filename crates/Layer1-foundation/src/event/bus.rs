//! Event Bus - event broadcast system
//!
//! Asynchronous publish/subscribe for task notifications.
//!
//! Delivery to registered listeners runs on a background dispatch task,
//! not inline in `publish`. Publishing is a bounded ring-buffer send, so
//! a caller may publish while holding state locks and a slow listener can
//! never stall it. Events enter the ring in publish order, which is the
//! order every subscriber observes.

use super::types::{EventCategory, WardenEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace, warn};

// ============================================================================
// EventListener Trait
// ============================================================================

/// Event listener ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event listener trait
///
/// Implemented by components that receive and handle events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Listener name (for debugging)
    fn name(&self) -> &str;

    /// Categories of interest (None means all events)
    fn categories(&self) -> Option<Vec<EventCategory>> {
        None
    }

    /// Handle an event
    async fn on_event(&self, event: &WardenEvent);
}

// ============================================================================
// EventFilter
// ============================================================================

/// Event filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Category filter
    pub categories: Option<Vec<EventCategory>>,

    /// Event type patterns (prefix match)
    pub event_types: Option<Vec<String>>,

    /// Source filter
    pub sources: Option<Vec<String>>,

    /// Minimum severity
    pub min_severity: Option<super::types::EventSeverity>,
}

impl EventFilter {
    /// Create a new filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category filter
    pub fn with_categories(mut self, categories: Vec<EventCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Add an event type filter
    pub fn with_event_types(mut self, types: Vec<String>) -> Self {
        self.event_types = Some(types);
        self
    }

    /// Add a source filter
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Check whether an event passes the filter
    pub fn matches(&self, event: &WardenEvent) -> bool {
        // Category check
        if let Some(ref cats) = self.categories {
            if !cats.contains(&event.category) {
                return false;
            }
        }

        // Event type check (prefix match)
        if let Some(ref types) = self.event_types {
            let matches = types.iter().any(|t| event.event_type.starts_with(t));
            if !matches {
                return false;
            }
        }

        // Source check
        if let Some(ref sources) = self.sources {
            if !sources.contains(&event.source) {
                return false;
            }
        }

        // Severity check
        if let Some(min_sev) = self.min_severity {
            if event.severity < min_sev {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Event bus settings
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Broadcast channel capacity
    pub channel_capacity: usize,

    /// Number of events kept in history
    pub history_size: usize,

    /// Debug mode (log every event)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 100,
            debug_mode: false,
        }
    }
}

/// Registered listener entry
struct RegisteredListener {
    listener: Arc<dyn EventListener>,
    filter: Option<EventFilter>,
}

/// Event bus
///
/// Broadcasts events across the whole system.
///
/// ## Usage
///
/// ```ignore
/// use warden_foundation::event::{EventBus, WardenEvent, EventCategory};
///
/// // Create a bus
/// let bus = EventBus::new();
///
/// // Register a listener
/// let id = bus.subscribe(my_listener).await;
///
/// // Publish an event
/// bus.publish(WardenEvent::new("test.event", EventCategory::System)).await;
///
/// // Unregister
/// bus.unsubscribe(id).await;
/// ```
pub struct EventBus {
    /// Settings
    config: EventBusConfig,

    /// Broadcast channel sender
    sender: broadcast::Sender<WardenEvent>,

    /// Registered listeners, shared with the dispatch task
    listeners: Arc<RwLock<HashMap<ListenerId, RegisteredListener>>>,

    /// Listener ID counter
    listener_counter: AtomicU64,

    /// Event history
    history: RwLock<Vec<WardenEvent>>,

    /// Number of events published
    event_count: AtomicU64,

    /// Whether the dispatch task has been spawned
    dispatch_started: AtomicBool,
}

impl EventBus {
    /// Create a bus with default settings
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with custom settings
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);

        Self {
            config,
            sender,
            listeners: Arc::new(RwLock::new(HashMap::new())),
            listener_counter: AtomicU64::new(0),
            history: RwLock::new(Vec::new()),
            event_count: AtomicU64::new(0),
            dispatch_started: AtomicBool::new(false),
        }
    }

    /// Register a listener
    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.subscribe_with_filter(listener, None).await
    }

    /// Register a listener with a filter
    pub async fn subscribe_with_filter(
        &self,
        listener: Arc<dyn EventListener>,
        filter: Option<EventFilter>,
    ) -> ListenerId {
        self.ensure_dispatch_task();

        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        let mut listeners = self.listeners.write().await;
        listeners.insert(id, RegisteredListener { listener, filter });

        id
    }

    /// Unregister a listener
    pub async fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let removed = listeners.remove(&id).is_some();

        if removed {
            debug!(listener_id = %id, "Unregistered event listener");
        }

        removed
    }

    /// Publish an event
    ///
    /// Returns as soon as the event is recorded and placed on the
    /// broadcast ring. Listener callbacks run later on the dispatch task.
    pub async fn publish(&self, event: WardenEvent) {
        let event_count = self.event_count.fetch_add(1, Ordering::SeqCst);

        if self.config.debug_mode {
            trace!(
                event_id = %event.id,
                event_type = %event.event_type,
                category = ?event.category,
                "Publishing event #{}", event_count + 1
            );
        }

        // Record in history
        {
            let mut history = self.history.write().await;
            history.push(event.clone());

            // History size limit
            if history.len() > self.config.history_size {
                history.remove(0);
            }
        }

        // Send on the broadcast channel; a send without receivers is fine
        let _ = self.sender.send(event);
    }

    /// Spawn the listener dispatch task (once per bus)
    ///
    /// The task consumes a broadcast receiver and forwards each event to
    /// the listeners registered at delivery time. Spawned lazily on first
    /// subscription so the bus itself can be built outside a runtime.
    fn ensure_dispatch_task(&self) {
        if self.dispatch_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let listeners = Arc::clone(&self.listeners);
        let mut rx = self.sender.subscribe();

        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Ring buffer wrapped: listeners observe a gap
                        warn!(missed, "Event dispatch lagged; listeners skipped events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let listeners = listeners.read().await;
                for (id, registered) in listeners.iter() {
                    let should_deliver = match &registered.filter {
                        Some(filter) => filter.matches(&event),
                        None => {
                            // Fall back to the listener's own category filter
                            match registered.listener.categories() {
                                Some(cats) => cats.contains(&event.category),
                                None => true,
                            }
                        }
                    };

                    if should_deliver {
                        trace!(
                            listener_id = %id,
                            listener_name = registered.listener.name(),
                            event_type = %event.event_type,
                            "Delivering event to listener"
                        );

                        registered.listener.on_event(&event).await;
                    }
                }
            }
        });
    }

    /// Create a broadcast receiver (stream style)
    pub fn receiver(&self) -> broadcast::Receiver<WardenEvent> {
        self.sender.subscribe()
    }

    /// Fetch recent event history
    pub async fn history(&self, limit: Option<usize>) -> Vec<WardenEvent> {
        let history = self.history.read().await;
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Search history with a filter
    pub async fn search_history(&self, filter: &EventFilter) -> Vec<WardenEvent> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Number of registered listeners
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Total number of events published
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }

    /// Clear the history
    pub async fn clear_history(&self) {
        let mut history = self.history.write().await;
        history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global EventBus
// ============================================================================

use std::sync::OnceLock;

static GLOBAL_EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// Initialize the global event bus
pub fn init_global_event_bus(config: EventBusConfig) -> Arc<EventBus> {
    GLOBAL_EVENT_BUS
        .get_or_init(|| Arc::new(EventBus::with_config(config)))
        .clone()
}

/// Get the global event bus
pub fn global_event_bus() -> Arc<EventBus> {
    GLOBAL_EVENT_BUS
        .get_or_init(|| Arc::new(EventBus::new()))
        .clone()
}

/// Publish on the global bus (convenience)
pub async fn publish(event: WardenEvent) {
    global_event_bus().publish(event).await;
}

// ============================================================================
// Tests
// ============================================================================
