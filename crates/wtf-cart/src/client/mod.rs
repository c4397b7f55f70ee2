//! HTTP client for the Shopify storefront AJAX cart API.

mod origin;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use wtf_core::{AddItem, AppConfig, CartLine, CartSnapshot, LineRef};

use crate::error::{CartError, Operation};
use crate::normalize::{normalize_cart, normalize_line};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::{ShopifyCart, ShopifyErrorBody, ShopifyLineItem};

pub use origin::store_origin;

pub const DEFAULT_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_USER_AGENT: &str = "wtf-cart/0.1 (storefront-client)";

const CART_PATH: &str = "/cart.js";
const ADD_PATH: &str = "/cart/add.js";
const CHANGE_PATH: &str = "/cart/change.js";
const CLEAR_PATH: &str = "/cart/clear.js";
const UPDATE_PATH: &str = "/cart/update.js";

/// Construction parameters for [`CartClient`].
#[derive(Clone)]
pub struct ClientSettings {
    pub store_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Value of the storefront `cart` cookie identifying the session.
    pub cart_token: Option<String>,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("store_url", &self.store_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("cart_token", &self.cart_token.as_ref().map(|_| "[redacted]"))
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientSettings {
    /// Defaults: 12s timeout, one retry after 500ms, no cart cookie.
    #[must_use]
    pub fn new(store_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            cart_token: None,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_url: config.store_url.clone(),
            timeout_secs: config.cart_request_timeout_secs,
            user_agent: config.cart_user_agent.clone(),
            cart_token: config.cart_token.clone(),
            retry: RetryPolicy::new(
                config.cart_max_retries,
                Duration::from_millis(config.cart_retry_delay_ms),
            ),
        }
    }
}

/// Typed wrapper over `/cart.js`, `/cart/add.js`, `/cart/change.js`,
/// `/cart/clear.js`, and `/cart/update.js`.
///
/// The client only performs network calls. Events, local snapshots, and
/// backups belong to [`crate::CartSession`].
pub struct CartClient {
    client: Client,
    origin: Url,
    domain: String,
    cart_token: Option<String>,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartClient")
            .field("origin", &self.origin.as_str())
            .field("cart_token", &self.cart_token.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CartClient {
    /// Builds a client with the configured timeout, `User-Agent`, and retry policy.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidStoreUrl`] if the store URL has no usable origin.
    /// - [`CartError::Client`] if the underlying `reqwest::Client` cannot be built.
    pub fn new(settings: &ClientSettings) -> Result<Self, CartError> {
        let origin = store_origin(&settings.store_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(10)))
            .user_agent(&settings.user_agent)
            .build()
            .map_err(CartError::Client)?;

        Ok(Self {
            client,
            domain: origin::extract_domain(&settings.store_url),
            origin,
            cart_token: settings.cart_token.clone(),
            timeout_secs: settings.timeout_secs,
            retry: settings.retry,
        })
    }

    /// Client with default settings for `store_url`.
    ///
    /// # Errors
    ///
    /// Same as [`CartClient::new`].
    pub fn with_store_url(store_url: &str) -> Result<Self, CartError> {
        Self::new(&ClientSettings::new(store_url))
    }

    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Fetches the authoritative cart.
    ///
    /// # Errors
    ///
    /// - [`CartError::Fetch`] on a non-2xx response.
    /// - [`CartError::Network`] / [`CartError::Timeout`] on transport failure.
    /// - [`CartError::Deserialize`] / [`CartError::InvalidResponse`] on a bad body.
    pub async fn get_cart(&self) -> Result<CartSnapshot, CartError> {
        let url = &self.endpoint(CART_PATH)?;
        retry_with_policy(self.retry, true, || async move {
            let response = self
                .send(Operation::Fetch, self.request(reqwest::Method::GET, url.clone()))
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CartError::Fetch {
                    status: status.as_u16(),
                });
            }
            self.read_cart(Operation::Fetch, response, CART_PATH).await
        })
        .await
    }

    /// Adds a line (or increments an identical one) and returns the line
    /// the server reports. The returned line has `line_index == 0`; its
    /// position is known only from the next snapshot.
    ///
    /// The request is validated before any network I/O.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] for a blank variant or quantity outside `1..=50`.
    /// - [`CartError::InvalidVariant`] on HTTP 422.
    /// - [`CartError::ProductNotFound`] on HTTP 404.
    /// - [`CartError::Add`] on any other non-2xx response.
    pub async fn add_to_cart(&self, item: &AddItem) -> Result<CartLine, CartError> {
        item.validate()?;
        let url = &self.endpoint(ADD_PATH)?;
        let form = &add_form(item);

        tracing::debug!(
            domain = %self.domain,
            variant_id = %item.variant_id,
            quantity = item.quantity,
            "adding item to cart"
        );

        retry_with_policy(self.retry, false, || async move {
            let request = self.request(reqwest::Method::POST, url.clone()).form(form);
            let response = self.send(Operation::Add, request).await?;
            let status = response.status();
            match status {
                StatusCode::UNPROCESSABLE_ENTITY => {
                    return Err(CartError::InvalidVariant {
                        description: failure_description(response).await,
                    });
                }
                StatusCode::NOT_FOUND => return Err(CartError::ProductNotFound),
                s if !s.is_success() => {
                    return Err(CartError::Add {
                        status: s.as_u16(),
                        description: failure_description(response).await,
                    });
                }
                _ => {}
            }
            let line: ShopifyLineItem = self.read_json(Operation::Add, response, ADD_PATH).await?;
            Ok(normalize_line(line, 0))
        })
        .await
    }

    /// Sets the quantity of a line; `quantity == 0` removes it.
    ///
    /// Quantity updates retry like other idempotent calls. Removals retry
    /// only on connect errors, as adds do.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] for `Line(0)` or a blank variant id.
    /// - [`CartError::Change`] on a non-2xx response.
    /// - Transport and decode errors as for [`CartClient::get_cart`].
    pub async fn change_quantity(
        &self,
        line: &LineRef,
        quantity: u32,
    ) -> Result<CartSnapshot, CartError> {
        line.validate()?;
        let url = &self.endpoint(CHANGE_PATH)?;
        let body = &match line {
            LineRef::Line(n) => serde_json::json!({ "line": n, "quantity": quantity }),
            LineRef::Variant(id) => serde_json::json!({ "id": id.as_str(), "quantity": quantity }),
        };

        // A removal shifts every later line index, so replaying one after a
        // lost response would drop a different line.
        let idempotent = quantity > 0;
        tracing::debug!(domain = %self.domain, %line, quantity, "changing cart line");

        retry_with_policy(self.retry, idempotent, || async move {
            let request = self.request(reqwest::Method::POST, url.clone()).json(body);
            let response = self.send(Operation::Change, request).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CartError::Change {
                    status: status.as_u16(),
                    description: failure_description(response).await,
                });
            }
            self.read_cart(Operation::Change, response, CHANGE_PATH).await
        })
        .await
    }

    /// Removes the line at the 1-based `line_index`.
    ///
    /// # Errors
    ///
    /// Same as [`CartClient::change_quantity`].
    pub async fn remove_line(&self, line_index: u32) -> Result<CartSnapshot, CartError> {
        self.change_quantity(&LineRef::Line(line_index), 0).await
    }

    /// Empties the cart. Clearing an empty cart succeeds with the same
    /// empty snapshot.
    ///
    /// # Errors
    ///
    /// - [`CartError::Clear`] on a non-2xx response.
    /// - Transport and decode errors as for [`CartClient::get_cart`].
    pub async fn clear_cart(&self) -> Result<CartSnapshot, CartError> {
        let url = &self.endpoint(CLEAR_PATH)?;
        retry_with_policy(self.retry, true, || async move {
            let response = self
                .send(Operation::Clear, self.request(reqwest::Method::POST, url.clone()))
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CartError::Clear {
                    status: status.as_u16(),
                });
            }
            self.read_cart(Operation::Clear, response, CLEAR_PATH).await
        })
        .await
    }

    /// Sets the cart note.
    ///
    /// # Errors
    ///
    /// - [`CartError::Update`] on a non-2xx response.
    /// - Transport and decode errors as for [`CartClient::get_cart`].
    pub async fn update_note(&self, note: &str) -> Result<CartSnapshot, CartError> {
        self.update(serde_json::json!({ "note": note })).await
    }

    /// Merges cart attributes. An empty value deletes the attribute
    /// server-side.
    ///
    /// # Errors
    ///
    /// Same as [`CartClient::update_note`].
    pub async fn update_attributes(
        &self,
        attributes: &BTreeMap<String, String>,
    ) -> Result<CartSnapshot, CartError> {
        self.update(serde_json::json!({ "attributes": attributes }))
            .await
    }

    async fn update(&self, body: serde_json::Value) -> Result<CartSnapshot, CartError> {
        let url = &self.endpoint(UPDATE_PATH)?;
        let body = &body;
        retry_with_policy(self.retry, true, || async move {
            let request = self.request(reqwest::Method::POST, url.clone()).json(body);
            let response = self.send(Operation::Update, request).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CartError::Update {
                    status: status.as_u16(),
                    description: failure_description(response).await,
                });
            }
            self.read_cart(Operation::Update, response, UPDATE_PATH).await
        })
        .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, CartError> {
        self.origin
            .join(path)
            .map_err(|e| CartError::InvalidStoreUrl {
                store_url: self.origin.to_string(),
                reason: format!("cannot join \"{path}\": {e}"),
            })
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.cart_token {
            Some(token) => request.header(reqwest::header::COOKIE, format!("cart={token}")),
            None => request,
        }
    }

    async fn send(
        &self,
        operation: Operation,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, CartError> {
        request
            .send()
            .await
            .map_err(|e| CartError::transport(operation, e, self.timeout_secs))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        response: Response,
        context: &str,
    ) -> Result<T, CartError> {
        let body = response
            .text()
            .await
            .map_err(|e| CartError::transport(operation, e, self.timeout_secs))?;
        serde_json::from_str(&body).map_err(|source| CartError::Deserialize {
            context: format!("{context} from {}", self.domain),
            source,
        })
    }

    async fn read_cart(
        &self,
        operation: Operation,
        response: Response,
        context: &str,
    ) -> Result<CartSnapshot, CartError> {
        let cart: ShopifyCart = self.read_json(operation, response, context).await?;
        normalize_cart(cart, context)
    }
}

/// Form body for `/cart/add.js`: `id`, `quantity`, `properties[Key]`.
fn add_form(item: &AddItem) -> Vec<(String, String)> {
    let mut form = vec![
        ("id".to_owned(), item.variant_id.as_str().to_owned()),
        ("quantity".to_owned(), item.quantity.to_string()),
    ];
    form.extend(
        item.submitted_properties()
            .map(|(k, v)| (format!("properties[{k}]"), v.to_owned())),
    );
    form
}

/// Server-provided error description, or the status reason phrase.
async fn failure_description(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ShopifyErrorBody>(&body)
        .ok()
        .and_then(ShopifyErrorBody::into_description)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned())
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
