//! Normalized e-commerce analytics forwarded from cart events.
//!
//! Each canonical event becomes at most one [`EcommerceEvent`], handed to
//! every configured sink exactly once. Pixel wiring lives in the sinks.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use wtf_core::{CartLine, CartSnapshot};

use crate::events::{CartEvent, CartListener};

const DEFAULT_ITEM_NAME: &str = "Custom Drink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EcommerceAction {
    ViewCart,
    AddToCart,
}

impl EcommerceAction {
    /// GA4 recommended-event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EcommerceAction::ViewCart => "view_cart",
            EcommerceAction::AddToCart => "add_to_cart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ga4,
    Meta,
    TikTok,
}

impl Platform {
    /// The platform's own name for `action`.
    #[must_use]
    pub fn event_name(self, action: EcommerceAction) -> &'static str {
        match (self, action) {
            (Platform::Ga4, action) => action.as_str(),
            (Platform::Meta | Platform::TikTok, EcommerceAction::ViewCart) => "ViewCart",
            (Platform::Meta | Platform::TikTok, EcommerceAction::AddToCart) => "AddToCart",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Ga4 => "ga4",
            Platform::Meta => "meta",
            Platform::TikTok => "tiktok",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsItem {
    pub item_id: String,
    pub item_name: String,
    pub item_variant: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl AnalyticsItem {
    fn from_line(line: &CartLine) -> Self {
        Self {
            item_id: line.variant_id.to_string(),
            item_name: line
                .product_title
                .clone()
                .unwrap_or_else(|| DEFAULT_ITEM_NAME.to_owned()),
            item_variant: line
                .variant_title
                .clone()
                .or_else(|| line.properties.get("Size").cloned())
                .unwrap_or_default(),
            price: cents(line.final_price_cents),
            quantity: line.quantity,
        }
    }
}

/// Platform-independent payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcommerceEvent {
    pub action: EcommerceAction,
    pub currency: String,
    pub value: Decimal,
    pub items: Vec<AnalyticsItem>,
}

fn cents(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Destination for normalized analytics calls.
pub trait AnalyticsSink: Send + Sync {
    fn platform(&self) -> Platform;

    /// `name` is already mapped for [`AnalyticsSink::platform`].
    fn track(&self, name: &str, event: &EcommerceEvent);
}

/// Sink that logs each call.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    platform: Platform,
}

impl TracingSink {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl AnalyticsSink for TracingSink {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn track(&self, name: &str, event: &EcommerceEvent) {
        tracing::info!(
            platform = %self.platform,
            event = name,
            currency = %event.currency,
            value = %event.value,
            items = event.items.len(),
            "analytics event"
        );
    }
}

/// Listener forwarding normalized events to every sink.
pub struct AnalyticsRelay {
    currency: String,
    sinks: Vec<Arc<dyn AnalyticsSink>>,
}

impl fmt::Debug for AnalyticsRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsRelay")
            .field("currency", &self.currency)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl AnalyticsRelay {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            sinks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// `view_cart` for `cart:update`, `add_to_cart` for `cart:add`, and
    /// nothing for `cart:error`.
    #[must_use]
    pub fn normalize(&self, event: &CartEvent) -> Option<EcommerceEvent> {
        match event {
            CartEvent::Update { cart } => Some(self.view_cart(cart)),
            CartEvent::Add { item, .. } => Some(EcommerceEvent {
                action: EcommerceAction::AddToCart,
                currency: self.currency.clone(),
                value: cents(item.line_total_cents()),
                items: vec![AnalyticsItem::from_line(item)],
            }),
            CartEvent::Error { .. } => None,
        }
    }

    fn view_cart(&self, cart: &CartSnapshot) -> EcommerceEvent {
        EcommerceEvent {
            action: EcommerceAction::ViewCart,
            currency: self.currency.clone(),
            value: cents(cart.total_price_cents()),
            items: cart.items().iter().map(AnalyticsItem::from_line).collect(),
        }
    }
}

impl CartListener for AnalyticsRelay {
    fn on_event(&self, event: &CartEvent) {
        let Some(normalized) = self.normalize(event) else {
            return;
        };
        for sink in &self.sinks {
            sink.track(sink.platform().event_name(normalized.action), &normalized);
        }
    }
}
