//! Cart domain types mirrored from the Shopify storefront cart.
//!
//! [`CartSnapshot`] is always the server's view of the cart. It is built
//! only through [`CartSnapshot::from_parts`] (or deserialization, which goes
//! through the same check), so every snapshot in memory satisfies
//! `item_count == Σ items[i].quantity`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::menu::Menu;

/// Storefront soft cap on the quantity of a single add-to-cart request.
pub const MAX_LINE_QUANTITY: u32 = 50;

/// Custom line-item properties (flavor list, strain, THC tier, ...).
pub type LineProperties = BTreeMap<String, String>;

/// Opaque Shopify product-variant identifier.
///
/// Shopify returns numeric ids in JSON, but nothing here does arithmetic on
/// them, so they are carried as trimmed strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self(id.trim().to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for VariantId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for VariantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("variant id is required")]
    MissingVariant,

    #[error("quantity {quantity} is out of range ({min}..={max})")]
    QuantityOutOfRange { quantity: u32, min: u32, max: u32 },

    #[error("cart item_count {item_count} does not match line quantities totalling {line_total}")]
    InconsistentSnapshot { item_count: u32, line_total: u64 },

    #[error("cart line {line_index} has zero quantity")]
    ZeroQuantityLine { line_index: u32 },

    #[error("line index is 1-based, got {line_index}")]
    InvalidLineIndex { line_index: u32 },

    #[error("{product_type} requires property \"{property}\"")]
    MissingProperty {
        product_type: String,
        property: String,
    },
}

/// One line item of a [`CartSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// 1-based position in server line order; the key for change/remove.
    /// Add responses carry no position, so a freshly added line reports 0
    /// until it is matched against the next snapshot.
    pub line_index: u32,
    /// Shopify's stable line key (`variant_id:hash`), when provided.
    #[serde(default)]
    pub key: Option<String>,
    pub variant_id: VariantId,
    pub quantity: u32,
    #[serde(default)]
    pub properties: LineProperties,
    /// Per-unit price after line-level discounts.
    pub final_price_cents: i64,
    #[serde(default)]
    pub product_title: Option<String>,
    #[serde(default)]
    pub variant_title: Option<String>,
}

impl CartLine {
    /// `final_price_cents * quantity`.
    #[must_use]
    pub fn line_total_cents(&self) -> i64 {
        self.final_price_cents.saturating_mul(i64::from(self.quantity))
    }

    /// Difference between the charged unit price and `expected_cents`, or
    /// `None` when they agree.
    #[must_use]
    pub fn price_mismatch(&self, expected_cents: i64) -> Option<i64> {
        let diff = self.final_price_cents.saturating_sub(expected_cents);
        (diff != 0).then_some(diff)
    }
}

/// The authoritative cart state, mirrored client-side after each mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct CartSnapshot {
    token: String,
    item_count: u32,
    total_price_cents: i64,
    items: Vec<CartLine>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    token: String,
    item_count: u32,
    total_price_cents: i64,
    #[serde(default)]
    items: Vec<CartLine>,
}

impl TryFrom<RawSnapshot> for CartSnapshot {
    type Error = ValidationError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        Self::from_parts(raw.token, raw.item_count, raw.total_price_cents, raw.items)
    }
}

impl CartSnapshot {
    /// Builds a snapshot, rejecting zero-quantity lines and an `item_count`
    /// that disagrees with the line quantities.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::ZeroQuantityLine`] if any line has quantity 0.
    /// - [`ValidationError::InconsistentSnapshot`] if the invariant fails.
    pub fn from_parts(
        token: impl Into<String>,
        item_count: u32,
        total_price_cents: i64,
        items: Vec<CartLine>,
    ) -> Result<Self, ValidationError> {
        if let Some(line) = items.iter().find(|l| l.quantity == 0) {
            return Err(ValidationError::ZeroQuantityLine {
                line_index: line.line_index,
            });
        }

        let line_total: u64 = items.iter().map(|l| u64::from(l.quantity)).sum();
        if line_total != u64::from(item_count) {
            return Err(ValidationError::InconsistentSnapshot {
                item_count,
                line_total,
            });
        }

        Ok(Self {
            token: token.into(),
            item_count,
            total_price_cents,
            items,
        })
    }

    #[must_use]
    pub fn empty(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            item_count: 0,
            total_price_cents: 0,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    #[must_use]
    pub fn total_price_cents(&self) -> i64 {
        self.total_price_cents
    }

    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up a line by its 1-based index.
    #[must_use]
    pub fn line(&self, line_index: u32) -> Option<&CartLine> {
        self.items.iter().find(|l| l.line_index == line_index)
    }

    /// Returns the first line carrying `variant_id`.
    #[must_use]
    pub fn find_variant(&self, variant_id: &VariantId) -> Option<&CartLine> {
        self.items.iter().find(|l| &l.variant_id == variant_id)
    }
}

/// Target of a change-quantity call: either a 1-based line index or a
/// variant id (Shopify resolves the latter to the first matching line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineRef {
    Line(u32),
    Variant(VariantId),
}

impl LineRef {
    /// Rejects line index 0 and blank variant ids before any network call.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidLineIndex`] for `Line(0)`.
    /// - [`ValidationError::MissingVariant`] for a blank variant id.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            LineRef::Line(0) => Err(ValidationError::InvalidLineIndex { line_index: 0 }),
            LineRef::Variant(id) if id.is_empty() => Err(ValidationError::MissingVariant),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Line(n) => write!(f, "line {n}"),
            LineRef::Variant(id) => write!(f, "variant {id}"),
        }
    }
}

/// An add-to-cart request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub variant_id: VariantId,
    pub quantity: u32,
    #[serde(default)]
    pub properties: LineProperties,
    /// Unit price the builder computed, checked against the cart line the
    /// storefront creates. Never sent to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_unit_price_cents: Option<i64>,
}

impl AddItem {
    #[must_use]
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
            properties: LineProperties::new(),
            expected_unit_price_cents: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Adds the `Order ID` and `Added At` properties so the line can be
    /// traced back to this submission at fulfillment time.
    #[must_use]
    pub fn stamped(self, at: DateTime<Utc>) -> Self {
        let order_id = format!("wtf_{}", Uuid::new_v4().simple());
        self.with_property("Order ID", order_id)
            .with_property("Added At", at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Client-side checks that run before any network call.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MissingVariant`] if the variant id is empty.
    /// - [`ValidationError::QuantityOutOfRange`] if quantity is outside `1..=50`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.variant_id.is_empty() {
            return Err(ValidationError::MissingVariant);
        }
        if !(1..=MAX_LINE_QUANTITY).contains(&self.quantity) {
            return Err(ValidationError::QuantityOutOfRange {
                quantity: self.quantity,
                min: 1,
                max: MAX_LINE_QUANTITY,
            });
        }
        Ok(())
    }

    /// Properties as they are sent to the storefront: values trimmed, and
    /// blank values dropped.
    pub fn submitted_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }

    /// Checks the properties the menu requires for `product_type`.
    /// Unknown product types have no requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingProperty`] for the first required
    /// property that is absent or blank.
    pub fn check_required_properties(
        &self,
        product_type: &str,
        menu: &Menu,
    ) -> Result<(), ValidationError> {
        let Some(required) = menu.required_properties.get(&product_type.to_lowercase()) else {
            return Ok(());
        };
        for property in required {
            let present = self
                .properties
                .get(property)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                return Err(ValidationError::MissingProperty {
                    product_type: product_type.to_owned(),
                    property: property.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_index: u32, variant: &str, quantity: u32) -> CartLine {
        CartLine {
            line_index,
            key: None,
            variant_id: VariantId::new(variant),
            quantity,
            properties: LineProperties::new(),
            final_price_cents: 900,
            product_title: None,
            variant_title: None,
        }
    }

    #[test]
    fn price_mismatch_reports_signed_difference() {
        let charged = line(1, "101", 1);
        assert_eq!(charged.price_mismatch(900), None);
        assert_eq!(charged.price_mismatch(1000), Some(-100));
        assert_eq!(charged.price_mismatch(850), Some(50));
    }

    #[test]
    fn expected_price_is_not_serialized_when_absent() {
        let value = serde_json::to_value(AddItem::new("101", 1)).unwrap();
        assert!(value.get("expected_unit_price_cents").is_none());
    }

    #[test]
    fn snapshot_accepts_matching_item_count() {
        let cart = CartSnapshot::from_parts(
            "tok",
            3,
            2700,
            vec![line(1, "101", 2), line(2, "102", 1)],
        )
        .unwrap();
        assert_eq!(cart.item_count(), 3);
        let sum: u32 = cart.items().iter().map(|l| l.quantity).sum();
        assert_eq!(sum, cart.item_count());
    }

    #[test]
    fn snapshot_rejects_mismatched_item_count() {
        let err = CartSnapshot::from_parts("tok", 5, 0, vec![line(1, "101", 2)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InconsistentSnapshot {
                item_count: 5,
                line_total: 2
            }
        );
    }

    #[test]
    fn snapshot_rejects_zero_quantity_line() {
        let err = CartSnapshot::from_parts("tok", 0, 0, vec![line(1, "101", 0)]).unwrap_err();
        assert_eq!(err, ValidationError::ZeroQuantityLine { line_index: 1 });
    }

    #[test]
    fn snapshot_deserialize_enforces_invariant() {
        let json = serde_json::json!({
            "token": "tok",
            "item_count": 4,
            "total_price_cents": 900,
            "items": [{
                "line_index": 1,
                "variant_id": "101",
                "quantity": 1,
                "final_price_cents": 900
            }]
        });
        assert!(serde_json::from_value::<CartSnapshot>(json).is_err());
    }

    #[test]
    fn empty_snapshot_has_no_items() {
        let cart = CartSnapshot::empty("tok");
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total_price_cents(), 0);
    }

    #[test]
    fn find_variant_and_line_lookup() {
        let cart =
            CartSnapshot::from_parts("tok", 3, 0, vec![line(1, "101", 2), line(2, "102", 1)])
                .unwrap();
        assert_eq!(cart.line(2).unwrap().variant_id.as_str(), "102");
        assert_eq!(
            cart.find_variant(&VariantId::new("101")).unwrap().line_index,
            1
        );
        assert!(cart.line(3).is_none());
    }

    #[test]
    fn add_item_rejects_zero_quantity() {
        let err = AddItem::new("101", 0).validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::QuantityOutOfRange { quantity: 0, .. }
        ));
    }

    #[test]
    fn add_item_rejects_quantity_over_soft_cap() {
        let err = AddItem::new("101", 51).validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::QuantityOutOfRange { quantity: 51, max: 50, .. }
        ));
    }

    #[test]
    fn add_item_accepts_bounds() {
        assert!(AddItem::new("101", 1).validate().is_ok());
        assert!(AddItem::new("101", 50).validate().is_ok());
    }

    #[test]
    fn add_item_rejects_blank_variant() {
        let err = AddItem::new("   ", 1).validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingVariant);
    }

    #[test]
    fn submitted_properties_drop_blank_values() {
        let item = AddItem::new("101", 1)
            .with_property("Strain", " Red ")
            .with_property("THC", "  ")
            .with_property("Size", "");
        let submitted: Vec<_> = item.submitted_properties().collect();
        assert_eq!(submitted, vec![("Strain", "Red")]);
    }

    #[test]
    fn stamped_adds_order_metadata() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let item = AddItem::new("101", 1).stamped(at);
        assert!(item.properties["Order ID"].starts_with("wtf_"));
        assert_eq!(item.properties["Added At"], "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn variant_id_from_number_and_display() {
        let id = VariantId::from(42_u64);
        assert_eq!(id.to_string(), "42");
        assert_eq!(LineRef::Variant(id).to_string(), "variant 42");
        assert_eq!(LineRef::Line(3).to_string(), "line 3");
    }

    #[test]
    fn line_ref_validation() {
        assert!(LineRef::Line(1).validate().is_ok());
        assert_eq!(
            LineRef::Line(0).validate().unwrap_err(),
            ValidationError::InvalidLineIndex { line_index: 0 }
        );
        assert_eq!(
            LineRef::Variant(VariantId::new(" ")).validate().unwrap_err(),
            ValidationError::MissingVariant
        );
    }
}
