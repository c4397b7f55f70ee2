//! `cart` command handlers.
//!
//! Each invocation wires one [`CartSession`] with the count badge, the
//! analytics relay, and the legacy event adapter, runs a single operation,
//! and prints the resulting cart as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use wtf_cart::{
    AnalyticsRelay, CartClient, CartSession, ClientSettings, CountBinder, CountTarget, EventBus,
    FileStore, LegacyAdapter, LegacyEvent, LegacySink, Platform, TracingSink,
};
use wtf_core::{AddItem, AppConfig, LineRef, VariantId};

use crate::{print_json, MenuArgs};

/// Sub-commands available under `cart`.
#[derive(Debug, Subcommand)]
pub enum CartCommands {
    /// Print the current cart
    Show,
    /// Add an item, either by variant id or from a drink-builder selection
    Add {
        /// Variant id to add
        #[arg(long, required_unless_present = "selection", conflicts_with = "selection")]
        variant: Option<String>,

        /// Quantity (1-50)
        #[arg(long, default_value_t = 1)]
        quantity: u32,

        /// Line-item property as KEY=VALUE; repeatable
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,

        /// Drink-builder selection YAML to compile into the line item
        #[arg(long)]
        selection: Option<PathBuf>,

        /// Product type whose required properties must be present
        #[arg(long)]
        product_type: Option<String>,

        #[command(flatten)]
        menu: MenuArgs,
    },
    /// Set a line's quantity; 0 removes it
    Change {
        /// 1-based line index
        #[arg(long, required_unless_present = "variant", conflicts_with = "variant")]
        line: Option<u32>,

        /// Variant id (first matching line)
        #[arg(long)]
        variant: Option<String>,

        #[arg(long)]
        quantity: u32,
    },
    /// Remove the line at a 1-based index
    Remove { line: u32 },
    /// Empty the cart
    Clear,
    /// Set the cart note
    Note { note: String },
}

pub(crate) fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{raw}\""))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("property key is empty in \"{raw}\""));
    }
    Ok((key.to_owned(), value.to_owned()))
}

pub(crate) async fn run(command: CartCommands, config: &AppConfig) -> anyhow::Result<()> {
    let session = build_session(config)?;

    match command {
        CartCommands::Show => print_json(&session.refresh().await?),
        CartCommands::Add {
            variant,
            quantity,
            properties,
            selection,
            product_type,
            menu,
        } => {
            let item = build_add_item(
                variant.as_deref(),
                quantity,
                properties,
                selection.as_deref(),
                product_type.as_deref(),
                menu.resolve(config),
            )?;
            if let Some(pending) = session.pending_backup() {
                tracing::info!(
                    variant_id = %pending.payload.variant_id,
                    saved_at = %pending.timestamp,
                    "replacing unconfirmed add from a previous run"
                );
            }
            let (line, cart) = session.add(&item.stamped(Utc::now())).await?;
            print_json(&json!({ "line": line, "cart": cart }))
        }
        CartCommands::Change {
            line,
            variant,
            quantity,
        } => {
            let target = match (line, variant) {
                (Some(index), _) => LineRef::Line(index),
                (None, Some(id)) => LineRef::Variant(VariantId::new(id)),
                (None, None) => anyhow::bail!("either --line or --variant is required"),
            };
            print_json(&session.change(&target, quantity).await?)
        }
        CartCommands::Remove { line } => print_json(&session.remove(line).await?),
        CartCommands::Clear => print_json(&session.clear().await?),
        CartCommands::Note { note } => print_json(&session.update_note(&note).await?),
    }
}

fn build_add_item(
    variant: Option<&str>,
    quantity: u32,
    properties: Vec<(String, String)>,
    selection: Option<&Path>,
    product_type: Option<&str>,
    menu_path: &Path,
) -> anyhow::Result<AddItem> {
    let needs_menu = selection.is_some() || product_type.is_some();
    let menu = if needs_menu {
        Some(wtf_core::load_menu(menu_path)?)
    } else {
        None
    };

    let mut item = match (selection, &menu) {
        (Some(path), Some(menu)) => {
            crate::builder::compile_selection_file(path, menu)?.to_add_item(quantity)?
        }
        _ => {
            let variant =
                variant.ok_or_else(|| anyhow::anyhow!("either --variant or --selection is required"))?;
            AddItem::new(variant, quantity)
        }
    };
    item.properties.extend(properties);

    if let (Some(product_type), Some(menu)) = (product_type, &menu) {
        item.check_required_properties(product_type, menu)?;
    }
    item.validate()?;
    Ok(item)
}

pub(crate) fn build_session(config: &AppConfig) -> anyhow::Result<CartSession<FileStore>> {
    let client = CartClient::new(&ClientSettings::from_config(config))?;

    let bus = Arc::new(EventBus::new());
    bus.subscribe(CountBinder::new().with_target(Arc::new(TerminalBadge)));
    bus.subscribe(
        AnalyticsRelay::new(config.currency.clone())
            .with_sink(Arc::new(TracingSink::new(Platform::Ga4)))
            .with_sink(Arc::new(TracingSink::new(Platform::Meta)))
            .with_sink(Arc::new(TracingSink::new(Platform::TikTok))),
    );
    bus.subscribe(LegacyAdapter::new(LegacyLog));

    let backup = crate::backup::open_cache(config)?;
    Ok(CartSession::new(client, bus, backup))
}

/// Count badge rendered on stderr, keeping stdout for JSON.
struct TerminalBadge;

impl CountTarget for TerminalBadge {
    fn render(&self, item_count: u32) {
        if item_count == 0 {
            eprintln!("cart: empty");
        } else {
            eprintln!("cart: {item_count} item(s)");
        }
    }
}

/// Logs legacy event names for theme scripts that still listen for them.
struct LegacyLog;

impl LegacySink for LegacyLog {
    fn emit(&self, event: LegacyEvent) {
        tracing::debug!(event = event.name, "legacy cart event");
    }
}
