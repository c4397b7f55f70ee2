//! `builder` command handlers and the selection file format.
//!
//! A selection file describes one drink:
//!
//! ```yaml
//! size: medium
//! strains: [Red, Green]
//! flavors:
//!   - { flavor: Mango, pumps: 3 }
//!   - { flavor: Lime, pumps: 3 }
//! add_ons: [Boba]
//! thc_tier: Light
//! ```

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Deserialize;
use wtf_core::{compile, AppConfig, BuilderError, BuilderSelection, CompiledDrink, Menu};

use crate::{print_json, MenuArgs};

/// Sub-commands available under `builder`.
#[derive(Debug, Subcommand)]
pub enum BuilderCommands {
    /// Compile a selection file and print its price and line-item properties
    Price {
        /// Selection YAML file
        #[arg(long)]
        selection: PathBuf,

        #[command(flatten)]
        menu: MenuArgs,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SelectionFile {
    pub size: String,
    #[serde(default)]
    pub strains: Vec<String>,
    #[serde(default)]
    pub flavors: Vec<FlavorPick>,
    #[serde(default)]
    pub add_ons: Vec<String>,
    #[serde(default)]
    pub thc_tier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FlavorPick {
    pub flavor: String,
    pub pumps: u32,
}

impl SelectionFile {
    /// Replays the file through the builder operations, applying the
    /// menu's strain policy and per-flavor cap.
    ///
    /// # Errors
    ///
    /// - [`BuilderError::UnknownSize`] if the size is not on the menu.
    /// - [`BuilderError::StrainLimit`] under the `reject` strain policy.
    pub(crate) fn apply(&self, menu: &Menu) -> Result<BuilderSelection, BuilderError> {
        let size = menu
            .size(&self.size)
            .ok_or_else(|| BuilderError::UnknownSize(self.size.clone()))?;

        let mut selection = BuilderSelection::new();
        selection.select_size(size);

        for strain in &self.strains {
            if let Some(evicted) =
                selection.select_strain(strain, menu.strain_policy, menu.max_strains)?
            {
                tracing::warn!(%evicted, strain = %strain, "strain mix full, dropped oldest");
            }
        }

        for pick in &self.flavors {
            let stored = selection.set_pumps(&pick.flavor, pick.pumps, menu.max_pumps_per_flavor);
            if stored < pick.pumps {
                tracing::warn!(
                    flavor = %pick.flavor,
                    requested = pick.pumps,
                    stored,
                    "pump count clamped to per-flavor cap"
                );
            }
        }

        for add_on in &self.add_ons {
            if !selection.add_ons().contains(add_on) {
                selection.toggle_add_on(add_on);
            }
        }
        selection.set_thc_tier(self.thc_tier.clone());

        Ok(selection)
    }
}

pub(crate) fn load_selection_file(path: &Path) -> anyhow::Result<SelectionFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read selection file {}: {e}", path.display()))?;
    Ok(serde_yaml::from_str(&content)?)
}

pub(crate) fn compile_selection_file(path: &Path, menu: &Menu) -> anyhow::Result<CompiledDrink> {
    let selection = load_selection_file(path)?.apply(menu)?;
    Ok(compile(&selection, menu)?)
}

pub(crate) fn run(command: &BuilderCommands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        BuilderCommands::Price { selection, menu } => {
            let menu = wtf_core::load_menu(menu.resolve(config))?;
            print_json(&compile_selection_file(selection, &menu)?)
        }
    }
}
