//! Normalization from raw Shopify cart types to [`wtf_core`] domain types.

use wtf_core::{CartLine, CartSnapshot, LineProperties, VariantId};

use crate::error::CartError;
use crate::types::{ShopifyCart, ShopifyLineItem};

/// Normalizes a raw [`ShopifyCart`] into a [`CartSnapshot`], assigning
/// 1-based line indexes in server order.
///
/// # Errors
///
/// Returns [`CartError::InvalidResponse`] if the cart violates the
/// snapshot invariants (zero-quantity lines, `item_count` mismatch).
pub fn normalize_cart(cart: ShopifyCart, context: &str) -> Result<CartSnapshot, CartError> {
    let items = cart
        .items
        .into_iter()
        .zip(1u32..)
        .map(|(item, idx)| normalize_line(item, idx))
        .collect();

    CartSnapshot::from_parts(cart.token, cart.item_count, cart.total_price, items).map_err(
        |source| CartError::InvalidResponse {
            context: context.to_owned(),
            source,
        },
    )
}

/// Normalizes a raw line item. `line_index` is 0 for add responses, which
/// carry no position.
#[must_use]
pub fn normalize_line(item: ShopifyLineItem, line_index: u32) -> CartLine {
    let final_price_cents = item.final_price.or(item.price).unwrap_or(0);

    CartLine {
        line_index,
        key: item.key.filter(|k| !k.is_empty()),
        variant_id: VariantId::new(item.variant_id),
        quantity: item.quantity,
        properties: normalize_properties(item.properties),
        final_price_cents,
        product_title: item.product_title,
        variant_title: item.variant_title.filter(|t| !t.is_empty()),
    }
}

/// Stringifies property values and drops `null`s.
fn normalize_properties(
    properties: Option<serde_json::Map<String, serde_json::Value>>,
) -> LineProperties {
    properties
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
