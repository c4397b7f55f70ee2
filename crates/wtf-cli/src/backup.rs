//! `backup` command handlers.

use clap::Subcommand;
use wtf_cart::{BackupCache, FileStore};
use wtf_core::AppConfig;

use crate::print_json;

/// Sub-commands available under `backup`.
#[derive(Debug, Subcommand)]
pub enum BackupCommands {
    /// Print the pending add-to-cart backup, or null if none
    Show,
    /// Discard the pending backup
    Clear,
}

/// Opens the file-backed cache under `WTF_BACKUP_DIR` with the configured TTL.
///
/// # Errors
///
/// Returns an error if the configured TTL does not fit a chrono duration.
pub(crate) fn open_cache(config: &AppConfig) -> anyhow::Result<BackupCache<FileStore>> {
    let ttl_secs = i64::try_from(config.backup_ttl_secs)?;
    let ttl = chrono::Duration::try_seconds(ttl_secs)
        .ok_or_else(|| anyhow::anyhow!("backup TTL {ttl_secs}s is out of range"))?;
    Ok(BackupCache::with_ttl(
        FileStore::new(config.backup_dir.clone()),
        ttl,
    ))
}

pub(crate) fn run(command: &BackupCommands, config: &AppConfig) -> anyhow::Result<()> {
    let cache = open_cache(config)?;

    match command {
        BackupCommands::Show => print_json(&cache.get()),
        BackupCommands::Clear => {
            cache.clear();
            tracing::info!(dir = %cache.store().dir().display(), "cart backup cleared");
            Ok(())
        }
    }
}
