//! Shopify storefront AJAX cart response types.
//!
//! ## Observed shape
//!
//! ### Ids
//! `variant_id` (and the legacy `id`) are JSON numbers. Older themes and
//! some apps echo them back as strings, so both are accepted.
//!
//! ### Money
//! `total_price`, `price`, and `final_price` are integers in the store
//! currency's minor unit (cents), not decimal strings as in `products.json`.
//!
//! ### `properties`
//! Either `null` or an object. Values are usually strings but apps write
//! numbers and booleans too; `null` values appear for cleared properties.
//!
//! ### Error bodies
//! 4xx responses from `/cart/add.js` look like
//! `{"status": 422, "message": "Cart Error", "description": "All 1 ... are in your cart."}`.
//! `status` is sometimes a string (`"bad_request"`).

use serde::{Deserialize, Deserializer};

/// Response from `GET /cart.js` (and the mutation endpoints that echo the cart).
#[derive(Debug, Deserialize)]
pub struct ShopifyCart {
    pub token: String,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,

    pub item_count: u32,

    /// Cart total in cents.
    pub total_price: i64,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub items: Vec<ShopifyLineItem>,
}

/// One line in a cart, or the body of a successful `POST /cart/add.js`.
#[derive(Debug, Deserialize)]
pub struct ShopifyLineItem {
    /// Stable line key, e.g. `"39897499729985:4f6e..."`.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(deserialize_with = "deserialize_id")]
    pub variant_id: String,

    pub quantity: u32,

    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,

    /// Unit price before line-level discounts, in cents.
    #[serde(default)]
    pub price: Option<i64>,

    /// Unit price after line-level discounts, in cents.
    #[serde(default)]
    pub final_price: Option<i64>,

    #[serde(default)]
    pub product_title: Option<String>,

    #[serde(default)]
    pub variant_title: Option<String>,
}

/// Error body returned with non-2xx cart responses.
#[derive(Debug, Default, Deserialize)]
pub struct ShopifyErrorBody {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ShopifyErrorBody {
    /// `description`, falling back to `message`.
    #[must_use]
    pub fn into_description(self) -> Option<String> {
        self.description
            .filter(|d| !d.trim().is_empty())
            .or(self.message.filter(|m| !m.trim().is_empty()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => n.to_string(),
        IdRepr::Text(s) => s,
    })
}
