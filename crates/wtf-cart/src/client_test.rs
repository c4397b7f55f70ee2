use super::*;

#[test]
fn store_origin_strips_path() {
    let origin = store_origin("https://shop.example.com/collections/kava").unwrap();
    assert_eq!(origin.as_str(), "https://shop.example.com/");
}

#[test]
fn store_origin_keeps_port() {
    let origin = store_origin("http://127.0.0.1:8080/").unwrap();
    assert_eq!(origin.as_str(), "http://127.0.0.1:8080/");
}

#[test]
fn store_origin_rejects_invalid_url() {
    let err = store_origin("not-a-url").unwrap_err();
    assert!(
        matches!(err, CartError::InvalidStoreUrl { .. }),
        "expected InvalidStoreUrl, got: {err:?}"
    );
}

#[test]
fn store_origin_rejects_non_http_scheme() {
    let err = store_origin("ftp://shop.example.com").unwrap_err();
    assert!(matches!(err, CartError::InvalidStoreUrl { ref reason, .. } if reason.contains("ftp")));
}

#[test]
fn endpoints_join_onto_origin() {
    let client = CartClient::with_store_url("https://shop.example.com/pages/menu").unwrap();
    assert_eq!(
        client.endpoint(CHANGE_PATH).unwrap().as_str(),
        "https://shop.example.com/cart/change.js"
    );
    assert_eq!(
        client.endpoint(CART_PATH).unwrap().as_str(),
        "https://shop.example.com/cart.js"
    );
}

#[test]
fn extract_domain_for_logs() {
    assert_eq!(
        origin::extract_domain("https://shop.example.com/cart"),
        "shop.example.com"
    );
    assert_eq!(origin::extract_domain("garbage"), "garbage");
}

#[test]
fn add_form_encodes_properties_and_skips_blank_values() {
    let item = AddItem::new("4001", 2)
        .with_property("Size", "Medium")
        .with_property("THC", "   ");
    let form = add_form(&item);
    assert_eq!(
        form,
        vec![
            ("id".to_owned(), "4001".to_owned()),
            ("quantity".to_owned(), "2".to_owned()),
            ("properties[Size]".to_owned(), "Medium".to_owned()),
        ]
    );
}

#[test]
fn settings_debug_redacts_cart_token() {
    let mut settings = ClientSettings::new("https://shop.example.com");
    settings.cart_token = Some("c1-secret".to_owned());
    let debug = format!("{settings:?}");
    assert!(!debug.contains("c1-secret"));
    assert!(debug.contains("[redacted]"));
}
