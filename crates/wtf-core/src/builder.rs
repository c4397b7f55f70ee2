//! Drink-builder selection state and its price/property compiler.
//!
//! [`BuilderSelection`] is the per-page form state. Everything that turns a
//! selection into a price or into Shopify line-item properties is a pure
//! function of the selection and the [`Menu`].

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::cart::{AddItem, LineProperties, VariantId};
use crate::menu::{Menu, SizeOption, StrainPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("no size selected")]
    NoSizeSelected,

    #[error("size '{0}' is not on the menu")]
    UnknownSize(String),

    #[error("{total} pumps exceeds the {max}-pump limit for size '{size}'")]
    PumpLimitExceeded { total: u32, max: u32, size: String },

    #[error("at most {max} strains can be mixed")]
    StrainLimit { max: usize },

    #[error("selected size '{0}' has no purchasable variant")]
    MissingVariant(String),

    #[error("size '{0}' requires a THC tier")]
    ThcTierRequired(String),
}

/// Pump pricing inputs: pumps up to `included_pumps` are free, every pump
/// beyond that costs `extra_pump_cost_cents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpPricing {
    pub included_pumps: u32,
    pub extra_pump_cost_cents: i64,
}

/// Customization state for one drink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderSelection {
    base_price_cents: i64,
    size_code: Option<String>,
    variant_id: Option<VariantId>,
    /// Oldest selection first.
    strains: Vec<String>,
    /// Flavor name and pump count, in the order flavors were first picked.
    flavors: Vec<(String, u32)>,
    add_ons: BTreeSet<String>,
    thc_tier: Option<String>,
}

impl BuilderSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_size(&mut self, size: &SizeOption) {
        self.base_price_cents = size.base_price_cents;
        self.size_code = Some(size.code.clone());
        self.variant_id.clone_from(&size.variant_id);
    }

    /// Adds `strain` to the mix.
    ///
    /// When `max_strains` are already selected, `policy` decides: with
    /// [`StrainPolicy::EvictOldest`] the earliest pick is dropped and
    /// returned; with [`StrainPolicy::Reject`] the selection is unchanged.
    /// Re-selecting a strain that is already in the mix is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::StrainLimit`] under [`StrainPolicy::Reject`]
    /// when the mix is full.
    pub fn select_strain(
        &mut self,
        strain: &str,
        policy: StrainPolicy,
        max_strains: usize,
    ) -> Result<Option<String>, BuilderError> {
        let strain = strain.trim();
        if strain.is_empty() || self.strains.iter().any(|s| s == strain) {
            return Ok(None);
        }

        if self.strains.len() < max_strains {
            self.strains.push(strain.to_owned());
            return Ok(None);
        }

        match policy {
            StrainPolicy::Reject => Err(BuilderError::StrainLimit { max: max_strains }),
            StrainPolicy::EvictOldest => {
                let evicted = if self.strains.is_empty() {
                    None
                } else {
                    Some(self.strains.remove(0))
                };
                self.strains.push(strain.to_owned());
                Ok(evicted)
            }
        }
    }

    /// Returns `true` if the strain was selected.
    pub fn deselect_strain(&mut self, strain: &str) -> bool {
        let before = self.strains.len();
        self.strains.retain(|s| s != strain);
        self.strains.len() != before
    }

    /// Sets the pump count for `flavor`, clamped to `max_per_flavor`.
    /// A count of zero removes the flavor. Returns the stored count.
    pub fn set_pumps(&mut self, flavor: &str, pumps: u32, max_per_flavor: u32) -> u32 {
        let pumps = pumps.min(max_per_flavor);
        let existing = self.flavors.iter().position(|(name, _)| name == flavor);

        match (existing, pumps) {
            (Some(idx), 0) => {
                self.flavors.remove(idx);
            }
            (Some(idx), n) => {
                if let Some(entry) = self.flavors.get_mut(idx) {
                    entry.1 = n;
                }
            }
            (None, 0) => {}
            (None, n) => self.flavors.push((flavor.to_owned(), n)),
        }
        pumps
    }

    /// Returns `true` if the add-on is selected after the toggle.
    pub fn toggle_add_on(&mut self, add_on: &str) -> bool {
        if self.add_ons.remove(add_on) {
            false
        } else {
            self.add_ons.insert(add_on.to_owned());
            true
        }
    }

    pub fn set_thc_tier(&mut self, tier: Option<String>) {
        self.thc_tier = tier.filter(|t| !t.trim().is_empty());
    }

    #[must_use]
    pub fn base_price_cents(&self) -> i64 {
        self.base_price_cents
    }

    #[must_use]
    pub fn size_code(&self) -> Option<&str> {
        self.size_code.as_deref()
    }

    #[must_use]
    pub fn strains(&self) -> &[String] {
        &self.strains
    }

    #[must_use]
    pub fn flavors(&self) -> &[(String, u32)] {
        &self.flavors
    }

    #[must_use]
    pub fn add_ons(&self) -> &BTreeSet<String> {
        &self.add_ons
    }

    #[must_use]
    pub fn thc_tier(&self) -> Option<&str> {
        self.thc_tier.as_deref()
    }

    #[must_use]
    pub fn total_pumps(&self) -> u32 {
        self.flavors
            .iter()
            .fold(0u32, |total, (_, n)| total.saturating_add(*n))
    }
}

/// `base + max(0, total_pumps - included) * extra_pump_cost`.
#[must_use]
pub fn price_cents(selection: &BuilderSelection, pricing: PumpPricing) -> i64 {
    let extra_pumps = selection
        .total_pumps()
        .saturating_sub(pricing.included_pumps);
    selection
        .base_price_cents
        .saturating_add(i64::from(extra_pumps).saturating_mul(pricing.extra_pump_cost_cents))
}

/// Two strains always render as a half/half mix regardless of pump split.
#[must_use]
pub fn strain_display(strains: &[String]) -> String {
    match strains {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("½ {a} / ½ {b}"),
        more => more.join(", "),
    }
}

fn flavor_summary(flavors: &[(String, u32)]) -> String {
    let parts: Vec<String> = flavors
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(name, n)| {
            let unit = if *n == 1 { "pump" } else { "pumps" };
            format!("{name} ({n} {unit})")
        })
        .collect();
    if parts.is_empty() {
        "None".to_owned()
    } else {
        parts.join(", ")
    }
}

/// Line-item properties recorded on the cart line for this drink.
#[must_use]
pub fn line_item_properties(selection: &BuilderSelection) -> LineProperties {
    let mut props = LineProperties::new();

    if let Some(size) = &selection.size_code {
        props.insert("Size".to_owned(), size.clone());
    }

    let strain = strain_display(&selection.strains);
    if !strain.is_empty() {
        props.insert("Strain".to_owned(), strain);
    }

    props.insert(
        "Flavors & Pumps".to_owned(),
        flavor_summary(&selection.flavors),
    );
    props.insert(
        "Total Pumps".to_owned(),
        selection.total_pumps().to_string(),
    );
    props.insert(
        "THC".to_owned(),
        selection.thc_tier.clone().unwrap_or_else(|| "None".to_owned()),
    );

    let add_ons = if selection.add_ons.is_empty() {
        "None".to_owned()
    } else {
        selection
            .add_ons
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    props.insert("Add-ons".to_owned(), add_ons);

    props
}

/// A drink ready to be added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledDrink {
    pub size_code: String,
    pub variant_id: Option<VariantId>,
    pub total_price_cents: i64,
    pub properties: LineProperties,
}

impl CompiledDrink {
    /// # Errors
    ///
    /// Returns [`BuilderError::MissingVariant`] if the size has no variant id.
    pub fn to_add_item(&self, quantity: u32) -> Result<AddItem, BuilderError> {
        let variant_id = self
            .variant_id
            .clone()
            .ok_or_else(|| BuilderError::MissingVariant(self.size_code.clone()))?;
        Ok(AddItem {
            variant_id,
            quantity,
            properties: self.properties.clone(),
            expected_unit_price_cents: Some(self.total_price_cents),
        })
    }
}

/// Validates the selection against the menu and compiles price and
/// properties. The pump limit only blocks add-to-cart here; the storefront
/// has no knowledge of it.
///
/// # Errors
///
/// - [`BuilderError::NoSizeSelected`] if no size was picked.
/// - [`BuilderError::UnknownSize`] if the size is not on the menu.
/// - [`BuilderError::PumpLimitExceeded`] if total pumps exceed the size's maximum.
/// - [`BuilderError::ThcTierRequired`] if the size needs a THC tier and none is set.
pub fn compile(selection: &BuilderSelection, menu: &Menu) -> Result<CompiledDrink, BuilderError> {
    let code = selection
        .size_code
        .as_deref()
        .ok_or(BuilderError::NoSizeSelected)?;
    let size = menu
        .size(code)
        .ok_or_else(|| BuilderError::UnknownSize(code.to_owned()))?;

    let total = selection.total_pumps();
    if total > size.max_pumps {
        return Err(BuilderError::PumpLimitExceeded {
            total,
            max: size.max_pumps,
            size: size.code.clone(),
        });
    }

    if size.requires_thc_tier && selection.thc_tier.is_none() {
        return Err(BuilderError::ThcTierRequired(size.code.clone()));
    }

    Ok(CompiledDrink {
        size_code: size.code.clone(),
        variant_id: selection.variant_id.clone(),
        total_price_cents: price_cents(selection, menu.pricing()),
        properties: line_item_properties(selection),
    })
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
