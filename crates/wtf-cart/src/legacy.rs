//! Translation between canonical cart events and the legacy event names
//! older theme scripts still emit and listen for.
//!
//! | Canonical     | Legacy                             | Legacy detail      |
//! |---------------|------------------------------------|--------------------|
//! | `cart:update` | `wtf:cart:update`, `cart:updated`  | Shopify cart JSON  |
//! | `cart:add`    | `wtf:cart:add`, `cart:added`       | `{item, cart}`     |
//!
//! `cart:error` has no legacy counterpart. This module is the only place
//! that knows legacy names or unwraps legacy payload shapes.

use serde_json::{json, Value};
use thiserror::Error;
use wtf_core::{CartLine, CartSnapshot};

use crate::events::{CartEvent, CartListener};
use crate::normalize::{normalize_cart, normalize_line};
use crate::types::{ShopifyCart, ShopifyLineItem};

pub const WTF_CART_UPDATE: &str = "wtf:cart:update";
pub const CART_UPDATED: &str = "cart:updated";
pub const WTF_CART_ADD: &str = "wtf:cart:add";
pub const CART_ADDED: &str = "cart:added";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown legacy cart event \"{0}\"")]
    UnknownEvent(String),

    #[error("malformed payload for \"{name}\": {reason}")]
    MalformedPayload { name: String, reason: String },
}

/// One event as a legacy consumer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEvent {
    pub name: &'static str,
    pub detail: Value,
}

/// Receives translated legacy events.
pub trait LegacySink: Send + Sync {
    fn emit(&self, event: LegacyEvent);
}

/// Listener re-emitting each canonical event under its legacy names.
#[derive(Debug)]
pub struct LegacyAdapter<S> {
    sink: S,
}

impl<S: LegacySink> LegacyAdapter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Legacy events for `event`, in emission order.
    #[must_use]
    pub fn translate(event: &CartEvent) -> Vec<LegacyEvent> {
        match event {
            CartEvent::Update { cart } => {
                let detail = shopify_cart_json(cart);
                vec![
                    LegacyEvent {
                        name: WTF_CART_UPDATE,
                        detail: detail.clone(),
                    },
                    LegacyEvent {
                        name: CART_UPDATED,
                        detail,
                    },
                ]
            }
            CartEvent::Add { item, cart } => {
                let detail = json!({
                    "item": shopify_line_json(item),
                    "cart": shopify_cart_json(cart),
                });
                vec![
                    LegacyEvent {
                        name: WTF_CART_ADD,
                        detail: detail.clone(),
                    },
                    LegacyEvent {
                        name: CART_ADDED,
                        detail,
                    },
                ]
            }
            CartEvent::Error { .. } => Vec::new(),
        }
    }
}

impl<S: LegacySink> CartListener for LegacyAdapter<S> {
    fn on_event(&self, event: &CartEvent) {
        for legacy in Self::translate(event) {
            self.sink.emit(legacy);
        }
    }
}

/// Parses a raw legacy event into its canonical form.
///
/// Update payloads may be either `{"cart": {...}}` or the bare cart; add
/// payloads must be `{"item": {...}, "cart": {...}}`.
///
/// # Errors
///
/// - [`EventError::UnknownEvent`] for a name with no canonical mapping.
/// - [`EventError::MalformedPayload`] if the detail does not decode or
///   violates the snapshot invariants.
pub fn parse_legacy(name: &str, detail: &Value) -> Result<CartEvent, EventError> {
    let malformed = |reason: String| EventError::MalformedPayload {
        name: name.to_owned(),
        reason,
    };

    match name {
        WTF_CART_UPDATE | CART_UPDATED => {
            let raw = detail.get("cart").unwrap_or(detail);
            let cart = decode_cart(raw).map_err(malformed)?;
            Ok(CartEvent::Update { cart })
        }
        WTF_CART_ADD | CART_ADDED => {
            let item = detail
                .get("item")
                .ok_or_else(|| malformed("missing \"item\"".to_owned()))?;
            let cart = detail
                .get("cart")
                .ok_or_else(|| malformed("missing \"cart\"".to_owned()))?;
            let item: ShopifyLineItem = from_detail(item).map_err(malformed)?;
            let cart = decode_cart(cart).map_err(malformed)?;
            Ok(CartEvent::Add {
                item: normalize_line(item, 0),
                cart,
            })
        }
        other => Err(EventError::UnknownEvent(other.to_owned())),
    }
}

fn decode_cart(raw: &Value) -> Result<CartSnapshot, String> {
    let cart: ShopifyCart = from_detail(raw)?;
    normalize_cart(cart, "legacy event").map_err(|e| e.to_string())
}

fn from_detail<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

/// Shopify-shaped cart JSON, as `/cart.js` returns it.
fn shopify_cart_json(cart: &CartSnapshot) -> Value {
    json!({
        "token": cart.token(),
        "item_count": cart.item_count(),
        "total_price": cart.total_price_cents(),
        "items": cart.items().iter().map(shopify_line_json).collect::<Vec<_>>(),
    })
}

fn shopify_line_json(line: &CartLine) -> Value {
    let variant_id = line
        .variant_id
        .as_str()
        .parse::<u64>()
        .map_or_else(|_| Value::from(line.variant_id.as_str()), Value::from);
    json!({
        "key": line.key,
        "variant_id": variant_id,
        "quantity": line.quantity,
        "properties": line.properties,
        "final_price": line.final_price_cents,
        "product_title": line.product_title,
        "variant_title": line.variant_title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wtf_core::{LineProperties, VariantId};

    use crate::events::EventBus;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<LegacyEvent>>>);

    impl LegacySink for Recorder {
        fn emit(&self, event: LegacyEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn line() -> CartLine {
        CartLine {
            line_index: 1,
            key: Some("4001:abc".to_owned()),
            variant_id: VariantId::new("4001"),
            quantity: 2,
            properties: LineProperties::from([("Size".to_owned(), "Large".to_owned())]),
            final_price_cents: 1200,
            product_title: Some("Kava Shell".to_owned()),
            variant_title: None,
        }
    }

    fn cart() -> CartSnapshot {
        CartSnapshot::from_parts("tok", 2, 2400, vec![line()]).unwrap()
    }

    #[test]
    fn update_emits_both_legacy_names_with_raw_cart() {
        let recorder = Recorder::default();
        let bus = EventBus::new();
        bus.subscribe(LegacyAdapter::new(recorder.clone()));

        bus.dispatch(&CartEvent::Update { cart: cart() });

        let events = recorder.0.lock().unwrap();
        let names: Vec<_> = events.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["wtf:cart:update", "cart:updated"]);
        assert_eq!(events[0].detail["item_count"], 2);
        assert_eq!(events[0].detail["items"][0]["variant_id"], 4001);
        assert_eq!(events[0].detail, events[1].detail);
    }

    #[test]
    fn add_emits_item_and_cart() {
        let events = LegacyAdapter::<Recorder>::translate(&CartEvent::Add {
            item: line(),
            cart: cart(),
        });
        let names: Vec<_> = events.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["wtf:cart:add", "cart:added"]);
        assert_eq!(events[0].detail["item"]["properties"]["Size"], "Large");
        assert_eq!(events[0].detail["cart"]["total_price"], 2400);
    }

    #[test]
    fn error_has_no_legacy_counterpart() {
        let event = CartEvent::from_error(
            crate::error::Operation::Add,
            &crate::error::CartError::ProductNotFound,
        );
        assert!(LegacyAdapter::<Recorder>::translate(&event).is_empty());
    }

    #[test]
    fn parse_accepts_wrapped_and_bare_cart() {
        let raw = shopify_cart_json(&cart());
        let wrapped = parse_legacy(CART_UPDATED, &json!({ "cart": raw.clone() })).unwrap();
        let bare = parse_legacy(WTF_CART_UPDATE, &raw).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.cart().unwrap().item_count(), 2);
    }

    #[test]
    fn parse_round_trips_translated_add() {
        let original = CartEvent::Add {
            item: line(),
            cart: cart(),
        };
        let legacy = &LegacyAdapter::<Recorder>::translate(&original)[1];
        let parsed = parse_legacy(legacy.name, &legacy.detail).unwrap();
        match parsed {
            CartEvent::Add {
                item,
                cart: parsed_cart,
            } => {
                assert_eq!(item.variant_id.as_str(), "4001");
                assert_eq!(item.line_index, 0);
                assert_eq!(parsed_cart, cart());
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let err = parse_legacy("cart:exploded", &json!({})).unwrap_err();
        assert_eq!(err, EventError::UnknownEvent("cart:exploded".to_owned()));
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        let err = parse_legacy(CART_ADDED, &json!({ "cart": {} })).unwrap_err();
        assert!(matches!(err, EventError::MalformedPayload { ref reason, .. } if reason.contains("item")));

        let inconsistent = json!({
            "token": "tok",
            "item_count": 9,
            "total_price": 0,
            "items": [{"variant_id": 1, "quantity": 1}]
        });
        assert!(matches!(
            parse_legacy(CART_UPDATED, &inconsistent),
            Err(EventError::MalformedPayload { .. })
        ));
    }
}
