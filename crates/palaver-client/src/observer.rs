//! Observer registry.
//!
//! Callers register any number of observers per event category; dispatch
//! invokes them in registration order on the driver task. Observers must not
//! block the delivery path - long-running work belongs on another task.

use std::{collections::HashMap, sync::Arc};

use palaver_core::{EventKind, SignalingEvent};
use parking_lot::RwLock;

/// Callback invoked with each event of its category.
type Observer = Arc<dyn Fn(&SignalingEvent) + Send + Sync>;

/// Per-category observer lists.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<HashMap<EventKind, Vec<Observer>>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one event category.
    pub fn register(
        &self,
        kind: EventKind,
        observer: impl Fn(&SignalingEvent) + Send + Sync + 'static,
    ) {
        self.observers.write().entry(kind).or_default().push(Arc::new(observer));
    }

    /// Invoke all observers registered for the event's category, in
    /// registration order.
    ///
    /// The list is cloned out before invocation so an observer may register
    /// further observers without deadlocking; those take effect from the
    /// next dispatch.
    pub fn dispatch(&self, event: &SignalingEvent) {
        let observers: Vec<Observer> =
            self.observers.read().get(&event.kind()).cloned().unwrap_or_default();
        for observer in &observers {
            observer(event);
        }
    }

    /// Number of observers registered for a category.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.observers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let observers = self.observers.read();
        f.debug_struct("ObserverRegistry")
            .field("connected", &observers.get(&EventKind::Connected).map_or(0, Vec::len))
            .field("disconnected", &observers.get(&EventKind::Disconnected).map_or(0, Vec::len))
            .field("error", &observers.get(&EventKind::Error).map_or(0, Vec::len))
            .field(
                "message_received",
                &observers.get(&EventKind::MessageReceived).map_or(0, Vec::len),
            )
            .finish()
    }
}
