//! Event System - publish/subscribe for FileWarden notifications
//!
//! Manages events raised anywhere in the system.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  publish(event) ──▶ history + broadcast ring        │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │ (dispatch task)                                   │
//! │         ▼                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │  Listener 1  │  │  Listener 2  │  │  Listener N  │      │
//! │  │  (UI)        │  │  (Logger)    │  │  (Webhook)   │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use warden_foundation::event::{
//!     EventBus, WardenEvent, EventCategory, EventListener,
//!     global_event_bus, publish,
//! };
//!
//! // 1. Implement a listener
//! struct MyListener;
//!
//! #[async_trait]
//! impl EventListener for MyListener {
//!     fn name(&self) -> &str { "my_listener" }
//!
//!     async fn on_event(&self, event: &WardenEvent) {
//!         println!("Received: {}", event.event_type);
//!     }
//! }
//!
//! // 2. Register the listener
//! let bus = global_event_bus();
//! bus.subscribe(Arc::new(MyListener)).await;
//!
//! // 3. Publish an event
//! publish(WardenEvent::new("test.event", EventCategory::System)).await;
//!
//! // 4. Use the predefined constructors
//! use warden_foundation::event::types::task;
//!
//! publish(task::queued("a1b2c3d4", snapshot)).await;
//! ```

pub mod bus;
pub mod types;

// Re-exports
pub use bus::{
    // Global functions
    global_event_bus,
    init_global_event_bus,
    publish,
    // EventBus
    EventBus,
    EventBusConfig,
    EventFilter,
    EventListener,
    ListenerId,
};

pub use types::{
    // Event constructors
    system,
    task,
    // Core types
    EventCategory,
    EventId,
    EventSeverity,
    WardenEvent,
};
