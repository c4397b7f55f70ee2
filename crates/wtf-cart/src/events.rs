//! Canonical cart events and the in-process dispatcher.
//!
//! Every cart mutation produces exactly one canonical event per kind.
//! Legacy names are produced (and consumed) only by [`crate::legacy`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use wtf_core::{CartLine, CartSnapshot};

use crate::error::{CartError, ErrorKind, Operation};

pub const CART_UPDATE: &str = "cart:update";
pub const CART_ADD: &str = "cart:add";
pub const CART_ERROR: &str = "cart:error";

/// A cart event. Serializes as `{"type": "cart:update", "detail": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum CartEvent {
    /// After any successful fetch, add, change, clear, or update.
    #[serde(rename = "cart:update")]
    Update { cart: CartSnapshot },

    /// After a successful add, following the matching `Update`.
    #[serde(rename = "cart:add")]
    Add { item: CartLine, cart: CartSnapshot },

    /// After any failed operation.
    #[serde(rename = "cart:error")]
    Error {
        operation: Operation,
        kind: ErrorKind,
        message: String,
    },
}

impl CartEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CartEvent::Update { .. } => CART_UPDATE,
            CartEvent::Add { .. } => CART_ADD,
            CartEvent::Error { .. } => CART_ERROR,
        }
    }

    /// `cart:error` for a failed `operation`.
    #[must_use]
    pub fn from_error(operation: Operation, err: &CartError) -> Self {
        CartEvent::Error {
            operation,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The cart carried by `Update` and `Add`.
    #[must_use]
    pub fn cart(&self) -> Option<&CartSnapshot> {
        match self {
            CartEvent::Update { cart } | CartEvent::Add { cart, .. } => Some(cart),
            CartEvent::Error { .. } => None,
        }
    }
}

/// Something that reacts to cart events.
pub trait CartListener: Send + Sync {
    fn on_event(&self, event: &CartEvent);
}

impl<F> CartListener for F
where
    F: Fn(&CartEvent) + Send + Sync,
{
    fn on_event(&self, event: &CartEvent) {
        self(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Explicitly constructed dispatcher, shared by `Arc` between the session
/// and whatever UI modules need it.
///
/// Listeners run synchronously, in attachment order. A listener attached
/// while a dispatch is running sees only later events.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn CartListener>)>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl CartListener + 'static) -> ListenerId {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Attaches a listener the caller keeps a handle to.
    pub fn subscribe_arc(&self, listener: Arc<dyn CartListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    /// Detaches a listener. Returns `false` if `id` was not attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn dispatch(&self, event: &CartEvent) {
        // Snapshot so listeners may subscribe/unsubscribe re-entrantly.
        let listeners: Vec<_> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        tracing::debug!(event = event.name(), listeners = listeners.len(), "dispatching cart event");
        for listener in listeners {
            listener.on_event(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn CartListener>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&CartEvent) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&log);
        let make = move |tag: &str| -> Box<dyn Fn(&CartEvent) + Send + Sync> {
            let log = Arc::clone(&handle);
            let tag = tag.to_owned();
            Box::new(move |event: &CartEvent| {
                log.lock().unwrap().push(format!("{tag}:{}", event.name()));
            })
        };
        (log, make)
    }

    fn update() -> CartEvent {
        CartEvent::Update {
            cart: CartSnapshot::empty("tok"),
        }
    }

    #[test]
    fn listeners_run_in_attachment_order() {
        let (log, make) = recorder();
        let bus = EventBus::new();
        bus.subscribe(make("a"));
        bus.subscribe(make("b"));
        bus.subscribe(make("c"));

        bus.dispatch(&update());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:cart:update", "b:cart:update", "c:cart:update"]
        );
    }

    #[test]
    fn unsubscribe_detaches_listener() {
        let (log, make) = recorder();
        let bus = EventBus::new();
        let a = bus.subscribe(make("a"));
        bus.subscribe(make("b"));

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.dispatch(&update());

        assert_eq!(*log.lock().unwrap(), vec!["b:cart:update"]);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn listener_attached_during_dispatch_sees_only_later_events() {
        let (log, make) = recorder();
        let bus = Arc::new(EventBus::new());
        let inner_bus = Arc::clone(&bus);
        let late = Mutex::new(Some(make("late")));
        bus.subscribe(move |_: &CartEvent| {
            if let Some(listener) = late.lock().unwrap().take() {
                inner_bus.subscribe(listener);
            }
        });

        bus.dispatch(&update());
        assert!(log.lock().unwrap().is_empty());

        bus.dispatch(&update());
        assert_eq!(*log.lock().unwrap(), vec!["late:cart:update"]);
    }

    #[test]
    fn events_serialize_with_type_and_detail() {
        let value = serde_json::to_value(update()).unwrap();
        assert_eq!(value["type"], "cart:update");
        assert_eq!(value["detail"]["cart"]["token"], "tok");

        let err = CartEvent::from_error(Operation::Add, &CartError::ProductNotFound);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "type": "cart:error",
                "detail": {
                    "operation": "add",
                    "kind": "product_not_found",
                    "message": "product not found"
                }
            })
        );
    }

    #[test]
    fn event_names_are_canonical() {
        assert_eq!(update().name(), "cart:update");
        assert!(update().cart().is_some());
        let err = CartEvent::from_error(Operation::Fetch, &CartError::Fetch { status: 500 });
        assert_eq!(err.name(), "cart:error");
        assert!(err.cart().is_none());
    }
}
