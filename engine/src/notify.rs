//! Change notification fan-out.
//!
//! Observers subscribe per entity type and receive the full list after every
//! local write that settles state. Delivery is synchronous and in
//! subscription order. A panicking handler is isolated and logged; it never
//! unwinds into the engine.

use crate::{EntityType, Record};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// "This entity set changed", with the list as it settled.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub entity_type: EntityType,
    pub records: Vec<Record>,
}

/// Handler invoked for each event.
pub type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Identifies one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    entity_type: EntityType,
}

impl SubscriptionHandle {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

struct Subscriber {
    id: u64,
    entity_type: EntityType,
    handler: Handler,
}

/// Registry of subscribers.
///
/// Thread-safe and can be shared via `Arc`.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one entity type.
    pub fn subscribe(
        &self,
        entity_type: impl Into<EntityType>,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entity_type = entity_type.into();

        self.write().push(Subscriber {
            id,
            entity_type: entity_type.clone(),
            handler: Arc::new(handler),
        });

        tracing::debug!(subscription = id, entity = %entity_type, "Subscriber registered");

        SubscriptionHandle { id, entity_type }
    }

    /// Remove a subscription. Returns whether it was registered.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscribers = self.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != handle.id);
        let removed = subscribers.len() != before;

        if removed {
            tracing::debug!(
                subscription = handle.id,
                entity = %handle.entity_type,
                "Subscriber removed"
            );
        }
        removed
    }

    /// Deliver an event to every subscriber of the entity type.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish(&self, entity_type: &str, records: Vec<Record>) -> usize {
        // Snapshot the handlers so a handler may (un)subscribe without deadlocking.
        let handlers: Vec<(u64, Handler)> = self
            .read()
            .iter()
            .filter(|s| s.entity_type == entity_type)
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();
        if handlers.is_empty() {
            return 0;
        }

        let event = ChangeEvent {
            entity_type: entity_type.to_string(),
            records,
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(
                        subscription = id,
                        entity = %entity_type,
                        "Subscriber panicked during notification"
                    );
                }
            }
        }

        tracing::debug!(entity = %entity_type, recipients = delivered, "Published change");

        delivered
    }

    /// Number of subscribers for an entity type.
    pub fn subscriber_count(&self, entity_type: &str) -> usize {
        self.read()
            .iter()
            .filter(|s| s.entity_type == entity_type)
            .count()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.read().len())
            .finish()
    }
}

/// A reactive list projection of one entity type.
///
/// Pure observer: caches the last published list and nothing else. Dropping
/// it unsubscribes.
pub struct LiveList {
    records: Arc<RwLock<Vec<Record>>>,
    notifier: Arc<ChangeNotifier>,
    handle: SubscriptionHandle,
}

impl LiveList {
    /// Subscribe, starting from `initial`.
    pub fn new(notifier: Arc<ChangeNotifier>, entity_type: &str, initial: Vec<Record>) -> Self {
        let records = Arc::new(RwLock::new(initial));
        let sink = Arc::clone(&records);
        let handle = notifier.subscribe(entity_type, move |event| {
            let mut cached = sink.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *cached = event.records.clone();
        });
        Self {
            records,
            notifier,
            handle,
        }
    }

    /// Copy of the cached list.
    pub fn snapshot(&self) -> Vec<Record> {
        self.guard().clone()
    }

    pub fn get(&self, index: usize) -> Option<Record> {
        self.guard().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> std::sync::RwLockReadGuard<'_, Vec<Record>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for LiveList {
    fn drop(&mut self) {
        self.notifier.unsubscribe(&self.handle);
    }
}

impl std::fmt::Debug for LiveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveList")
            .field("entity_type", &self.handle.entity_type)
            .field("len", &self.len())
            .finish()
    }
}
