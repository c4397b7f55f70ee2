//! Serialized cart session: one client, one event bus, one backup cache.
//!
//! Every operation holds a FIFO async gate for its whole request/response
//! cycle, so mutations reach the server and update the local snapshot in
//! submission order.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use wtf_core::{AddItem, CartLine, CartSnapshot, LineRef};

use crate::backup::{BackupCache, BackupRecord, BackupStore};
use crate::client::CartClient;
use crate::error::{CartError, ErrorKind, Operation};
use crate::events::{CartEvent, EventBus};

pub struct CartSession<S> {
    client: CartClient,
    bus: Arc<EventBus>,
    backup: BackupCache<S>,
    gate: Mutex<()>,
    snapshot: RwLock<Option<CartSnapshot>>,
}

impl<S> std::fmt::Debug for CartSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("client", &self.client)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<S: BackupStore> CartSession<S> {
    pub fn new(client: CartClient, bus: Arc<EventBus>, backup: BackupCache<S>) -> Self {
        Self {
            client,
            bus,
            backup,
            gate: Mutex::new(()),
            snapshot: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn client(&self) -> &CartClient {
        &self.client
    }

    /// Last snapshot received from the server, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<CartSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The unconfirmed add, if one is pending. Surfaced as a retry hint;
    /// never resubmitted automatically.
    #[must_use]
    pub fn pending_backup(&self) -> Option<BackupRecord> {
        self.backup.get()
    }

    /// Drops the pending backup without submitting it.
    pub fn discard_backup(&self) {
        self.backup.clear();
    }

    /// Fetches the authoritative cart.
    ///
    /// # Errors
    ///
    /// Propagates [`CartClient::get_cart`] errors after dispatching `cart:error`.
    pub async fn refresh(&self) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        match self.client.get_cart().await {
            Ok(cart) => Ok(self.publish(cart)),
            Err(err) => Err(self.fail(Operation::Fetch, err)),
        }
    }

    /// Adds `item`, then re-fetches the cart so the new line carries its
    /// real position.
    ///
    /// When `item` carries an expected unit price, a line charged at a
    /// different price is logged at `warn`; the add still succeeds.
    ///
    /// The request is backed up before submission. The backup is cleared
    /// once the server confirms the add and kept if the add fails.
    /// Dispatches `cart:update` followed by `cart:add` on success.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] before any network call or backup write.
    /// - Any [`CartClient::add_to_cart`] error (backup kept).
    /// - Any [`CartClient::get_cart`] error after a confirmed add (backup cleared).
    pub async fn add(&self, item: &AddItem) -> Result<(CartLine, CartSnapshot), CartError> {
        let _gate = self.gate.lock().await;
        if let Err(err) = item.validate() {
            return Err(self.fail(Operation::Add, err.into()));
        }

        self.backup.put(item);
        let added = match self.client.add_to_cart(item).await {
            Ok(line) => line,
            Err(err) => return Err(self.fail(Operation::Add, err)),
        };
        self.backup.clear();

        let cart = match self.client.get_cart().await {
            Ok(cart) => cart,
            Err(err) => return Err(self.fail(Operation::Fetch, err)),
        };

        let line = resolve_added_line(added, &cart);
        check_line_price(&line, item.expected_unit_price_cents);
        let cart = self.publish(cart);
        self.bus.dispatch(&CartEvent::Add {
            item: line.clone(),
            cart: cart.clone(),
        });
        Ok((line, cart))
    }

    /// Sets a line's quantity; 0 removes the line.
    ///
    /// On failure, dispatches `cart:error` and then reconciles by
    /// re-fetching the authoritative cart (dispatching `cart:update` if
    /// that succeeds) before returning the original error. Validation
    /// failures never reached the server and skip the reconcile.
    ///
    /// # Errors
    ///
    /// Propagates the [`CartClient::change_quantity`] error.
    pub async fn change(&self, line: &LineRef, quantity: u32) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        match self.client.change_quantity(line, quantity).await {
            Ok(cart) => Ok(self.publish(cart)),
            Err(err) => {
                let err = self.fail(Operation::Change, err);
                if err.kind() != ErrorKind::Validation {
                    self.reconcile().await;
                }
                Err(err)
            }
        }
    }

    /// Removes the line at the 1-based `line_index`.
    ///
    /// # Errors
    ///
    /// Same as [`CartSession::change`].
    pub async fn remove(&self, line_index: u32) -> Result<CartSnapshot, CartError> {
        self.change(&LineRef::Line(line_index), 0).await
    }

    /// Empties the cart and re-reads it.
    ///
    /// # Errors
    ///
    /// Propagates [`CartClient::clear_cart`] or [`CartClient::get_cart`] errors.
    pub async fn clear(&self) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        if let Err(err) = self.client.clear_cart().await {
            return Err(self.fail(Operation::Clear, err));
        }
        match self.client.get_cart().await {
            Ok(cart) => Ok(self.publish(cart)),
            Err(err) => Err(self.fail(Operation::Fetch, err)),
        }
    }

    /// # Errors
    ///
    /// Propagates [`CartClient::update_note`] errors.
    pub async fn update_note(&self, note: &str) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        match self.client.update_note(note).await {
            Ok(cart) => Ok(self.publish(cart)),
            Err(err) => Err(self.fail(Operation::Update, err)),
        }
    }

    /// # Errors
    ///
    /// Propagates [`CartClient::update_attributes`] errors.
    pub async fn update_attributes(
        &self,
        attributes: &BTreeMap<String, String>,
    ) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        match self.client.update_attributes(attributes).await {
            Ok(cart) => Ok(self.publish(cart)),
            Err(err) => Err(self.fail(Operation::Update, err)),
        }
    }

    async fn reconcile(&self) {
        match self.client.get_cart().await {
            Ok(cart) => {
                tracing::info!(item_count = cart.item_count(), "reconciled cart after failed change");
                self.publish(cart);
            }
            Err(err) => {
                tracing::warn!(error = %err, "cart reconcile failed, local snapshot may be stale");
            }
        }
    }

    /// Stores `cart` and dispatches `cart:update`.
    fn publish(&self, cart: CartSnapshot) -> CartSnapshot {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(cart.clone());
        self.bus.dispatch(&CartEvent::Update { cart: cart.clone() });
        cart
    }

    /// Logs and dispatches `cart:error`, handing the error back.
    fn fail(&self, operation: Operation, err: CartError) -> CartError {
        tracing::warn!(%operation, kind = ?err.kind(), error = %err, "cart operation failed");
        self.bus.dispatch(&CartEvent::from_error(operation, &err));
        err
    }
}

/// Finds the snapshot line the add landed on: by line key, else by
/// variant with exactly the added line's properties. Falls back to the add
/// response itself (`line_index == 0`).
fn resolve_added_line(added: CartLine, cart: &CartSnapshot) -> CartLine {
    let by_key = added
        .key
        .as_deref()
        .and_then(|key| cart.items().iter().find(|l| l.key.as_deref() == Some(key)));
    let found = by_key.or_else(|| {
        cart.items()
            .iter()
            .find(|l| l.variant_id == added.variant_id && l.properties == added.properties)
    });
    found.cloned().unwrap_or(added)
}

/// Warns when the storefront charged a different unit price than the
/// builder computed. Returns `false` on a mismatch.
fn check_line_price(line: &CartLine, expected_cents: Option<i64>) -> bool {
    let Some(expected) = expected_cents else {
        return true;
    };
    match line.price_mismatch(expected) {
        None => true,
        Some(diff_cents) => {
            tracing::warn!(
                variant_id = %line.variant_id,
                line_index = line.line_index,
                expected_cents = expected,
                charged_cents = line.final_price_cents,
                diff_cents,
                "cart line price differs from computed drink price"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wtf_core::{LineProperties, VariantId};

    fn line(index: u32, key: Option<&str>, variant: &str, size: &str) -> CartLine {
        CartLine {
            line_index: index,
            key: key.map(str::to_owned),
            variant_id: VariantId::new(variant),
            quantity: 1,
            properties: LineProperties::from([("Size".to_owned(), size.to_owned())]),
            final_price_cents: 900,
            product_title: None,
            variant_title: None,
        }
    }

    fn cart() -> CartSnapshot {
        CartSnapshot::from_parts(
            "tok",
            3,
            2700,
            vec![
                line(1, Some("1:a"), "1", "Small"),
                line(2, Some("1:b"), "1", "Large"),
                line(3, Some("2:c"), "2", "Small"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn resolves_by_key() {
        let resolved = resolve_added_line(line(0, Some("1:b"), "1", "Large"), &cart());
        assert_eq!(resolved.line_index, 2);
    }

    #[test]
    fn resolves_by_variant_and_properties_without_key() {
        let resolved = resolve_added_line(line(0, None, "1", "Large"), &cart());
        assert_eq!(resolved.line_index, 2);
    }

    #[test]
    fn keyless_add_without_properties_skips_lines_with_properties() {
        let mut bare = line(4, Some("1:d"), "1", "Small");
        bare.properties.clear();
        let items = vec![
            line(1, Some("1:a"), "1", "Small"),
            line(2, Some("1:b"), "1", "Large"),
            line(3, Some("2:c"), "2", "Small"),
            bare,
        ];
        let cart = CartSnapshot::from_parts("tok", 4, 3600, items).unwrap();

        let mut added = line(0, None, "1", "Small");
        added.properties.clear();
        assert_eq!(resolve_added_line(added, &cart).line_index, 4);
    }

    #[test]
    fn property_subset_does_not_match() {
        let mut added = line(0, None, "1", "Large");
        added
            .properties
            .insert("Order ID".to_owned(), "wtf_1".to_owned());
        assert_eq!(resolve_added_line(added, &cart()).line_index, 0);
    }

    #[test]
    fn price_check_flags_only_mismatches() {
        let charged = line(1, Some("1:a"), "1", "Small");
        assert!(check_line_price(&charged, None));
        assert!(check_line_price(&charged, Some(900)));
        assert!(!check_line_price(&charged, Some(1000)));
    }

    #[test]
    fn falls_back_to_add_response() {
        let resolved = resolve_added_line(line(0, None, "9", "Large"), &cart());
        assert_eq!(resolved.line_index, 0);
        assert_eq!(resolved.variant_id.as_str(), "9");
    }
}
