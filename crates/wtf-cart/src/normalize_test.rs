use super::*;
use serde_json::json;

// -----------------------------------------------------------------------
// normalize_cart
// -----------------------------------------------------------------------

fn make_cart(value: serde_json::Value) -> ShopifyCart {
    serde_json::from_value(value).unwrap()
}

#[test]
fn normalize_cart_assigns_one_based_line_indexes() {
    let cart = make_cart(json!({
        "token": "c1-abc",
        "item_count": 3,
        "total_price": 2500,
        "items": [
            {"key": "101:aa", "variant_id": 101, "quantity": 2, "final_price": 800},
            {"key": "102:bb", "variant_id": 102, "quantity": 1, "final_price": 900}
        ]
    }));

    let snapshot = normalize_cart(cart, "cart.js").unwrap();
    assert_eq!(snapshot.token(), "c1-abc");
    assert_eq!(snapshot.item_count(), 3);
    assert_eq!(snapshot.total_price_cents(), 2500);
    assert_eq!(snapshot.items()[0].line_index, 1);
    assert_eq!(snapshot.items()[1].line_index, 2);
    assert_eq!(snapshot.items()[1].variant_id.as_str(), "102");
    assert_eq!(snapshot.items()[0].key.as_deref(), Some("101:aa"));
}

#[test]
fn normalize_cart_rejects_item_count_mismatch() {
    let cart = make_cart(json!({
        "token": "c1-abc",
        "item_count": 5,
        "total_price": 800,
        "items": [{"variant_id": 101, "quantity": 1, "final_price": 800}]
    }));

    let err = normalize_cart(cart, "cart.js").unwrap_err();
    assert!(
        matches!(err, CartError::InvalidResponse { ref context, .. } if context == "cart.js"),
        "expected InvalidResponse, got: {err:?}"
    );
}

#[test]
fn normalize_cart_handles_empty_cart() {
    let cart = make_cart(json!({"token": "c1-abc", "item_count": 0, "total_price": 0, "items": []}));
    let snapshot = normalize_cart(cart, "cart/clear.js").unwrap();
    assert!(snapshot.is_empty());
}

// -----------------------------------------------------------------------
// normalize_line
// -----------------------------------------------------------------------

fn make_line(value: serde_json::Value) -> ShopifyLineItem {
    serde_json::from_value(value).unwrap()
}

#[test]
fn normalize_line_prefers_final_price() {
    let line = normalize_line(
        make_line(json!({"variant_id": 1, "quantity": 1, "price": 1000, "final_price": 900})),
        1,
    );
    assert_eq!(line.final_price_cents, 900);
}

#[test]
fn normalize_line_falls_back_to_price() {
    let line = normalize_line(
        make_line(json!({"variant_id": 1, "quantity": 1, "price": 1000})),
        1,
    );
    assert_eq!(line.final_price_cents, 1000);
}

#[test]
fn normalize_line_stringifies_properties_and_drops_nulls() {
    let line = normalize_line(
        make_line(json!({
            "variant_id": 1,
            "quantity": 1,
            "properties": {
                "Strain": "½ Red / ½ Green",
                "Total Pumps": 6,
                "Gift": false,
                "Note": null
            }
        })),
        0,
    );
    assert_eq!(line.properties["Strain"], "½ Red / ½ Green");
    assert_eq!(line.properties["Total Pumps"], "6");
    assert_eq!(line.properties["Gift"], "false");
    assert!(!line.properties.contains_key("Note"));
    assert_eq!(line.line_index, 0);
}

#[test]
fn normalize_line_drops_empty_variant_title() {
    let line = normalize_line(
        make_line(json!({
            "variant_id": 1,
            "quantity": 1,
            "product_title": "Kratom Tea",
            "variant_title": ""
        })),
        1,
    );
    assert_eq!(line.product_title.as_deref(), Some("Kratom Tea"));
    assert!(line.variant_title.is_none());
}
