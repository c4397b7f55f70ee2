use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::builder::PumpPricing;
use crate::cart::VariantId;
use crate::ConfigError;

/// What happens when a strain is picked while `max_strains` are already
/// selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrainPolicy {
    /// Drop the earliest selection to make room.
    #[default]
    EvictOldest,
    /// Refuse the new selection.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeOption {
    pub code: String,
    pub label: String,
    pub base_price_cents: i64,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    /// Upper bound on total pumps across all flavors for this size.
    pub max_pumps: u32,
    /// The drink cannot be added without a THC tier.
    #[serde(default)]
    pub requires_thc_tier: bool,
}

/// Drink-builder menu loaded from `config/menu.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub sizes: Vec<SizeOption>,
    pub included_pumps: u32,
    pub extra_pump_cost_cents: i64,
    #[serde(default = "default_max_pumps_per_flavor")]
    pub max_pumps_per_flavor: u32,
    #[serde(default)]
    pub strain_policy: StrainPolicy,
    #[serde(default = "default_max_strains")]
    pub max_strains: usize,
    /// Required line-item properties keyed by lowercase product type
    /// (e.g. `kratom: [Strain, Size, "Flavors & Pumps"]`).
    #[serde(default)]
    pub required_properties: BTreeMap<String, Vec<String>>,
}

/// Upper bound accepted for `max_pumps_per_flavor`.
pub const PUMP_CAP_LIMIT: u32 = 100;

fn default_max_pumps_per_flavor() -> u32 {
    12
}

fn default_max_strains() -> usize {
    2
}

impl Menu {
    #[must_use]
    pub fn size(&self, code: &str) -> Option<&SizeOption> {
        self.sizes.iter().find(|s| s.code.eq_ignore_ascii_case(code))
    }

    #[must_use]
    pub fn pricing(&self) -> PumpPricing {
        PumpPricing {
            included_pumps: self.included_pumps,
            extra_pump_cost_cents: self.extra_pump_cost_cents,
        }
    }
}

/// Load and validate the drink-builder menu from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_menu(path: &Path) -> Result<Menu, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MenuFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_menu(&content)
}

/// Parse and validate a menu from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_menu(content: &str) -> Result<Menu, ConfigError> {
    let mut menu: Menu = serde_yaml::from_str(content)?;
    menu.required_properties = menu
        .required_properties
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();
    validate_menu(&menu)?;
    Ok(menu)
}

fn validate_menu(menu: &Menu) -> Result<(), ConfigError> {
    if menu.sizes.is_empty() {
        return Err(ConfigError::Validation(
            "menu must define at least one size".to_string(),
        ));
    }

    if menu.extra_pump_cost_cents < 0 {
        return Err(ConfigError::Validation(format!(
            "extra_pump_cost_cents must be non-negative, got {}",
            menu.extra_pump_cost_cents
        )));
    }

    if menu.max_pumps_per_flavor > PUMP_CAP_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_pumps_per_flavor must be at most {PUMP_CAP_LIMIT}, got {}",
            menu.max_pumps_per_flavor
        )));
    }

    if menu.max_strains == 0 {
        return Err(ConfigError::Validation(
            "max_strains must be at least 1".to_string(),
        ));
    }

    let mut seen_codes = HashSet::new();
    for size in &menu.sizes {
        if size.code.trim().is_empty() {
            return Err(ConfigError::Validation(
                "size code must be non-empty".to_string(),
            ));
        }

        if !seen_codes.insert(size.code.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate size code: '{}'",
                size.code
            )));
        }

        if size.base_price_cents < 0 {
            return Err(ConfigError::Validation(format!(
                "size '{}' has negative base price {}",
                size.code, size.base_price_cents
            )));
        }

        if menu.included_pumps > size.max_pumps {
            return Err(ConfigError::Validation(format!(
                "size '{}' allows {} pumps but {} are included",
                size.code, size.max_pumps, menu.included_pumps
            )));
        }
    }

    Ok(())
}
