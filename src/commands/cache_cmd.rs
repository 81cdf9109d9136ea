use clap::{Args, Subcommand};
use serde::Serialize;

use troupe_core::{HealthReport, Notice};

use super::{print_json, OutputFormat};
use crate::context::AppContext;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Show cache health, usage and cached keys
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove a cached key with its timestamp and backups
    Remove {
        /// Cache key (e.g. staff, scenarios, schedule)
        key: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatus {
    key: String,
    last_saved: Option<String>,
    backups: usize,
}

#[derive(Serialize)]
struct CacheStatus {
    health: HealthReport,
    keys: Vec<KeyStatus>,
}

impl CacheCommand {
    pub fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            CacheSubcommand::Status { format } => {
                let health = ctx.cache.health_check();
                let keys: Vec<KeyStatus> = ctx
                    .cache
                    .data_keys()
                    .into_iter()
                    .map(|key| KeyStatus {
                        last_saved: ctx.cache.last_saved_time(&key).map(|t| t.to_rfc3339()),
                        backups: ctx.cache.backup_keys(&key).len(),
                        key,
                    })
                    .collect();

                match format {
                    OutputFormat::Json => print_json(&CacheStatus { health, keys })?,
                    OutputFormat::Text => {
                        println!("Cache: {}", ctx.config.cache_dir().display());
                        println!("Status: {}", health.status);
                        if let Some(usage) = &health.usage {
                            println!(
                                "Usage: {} / {} bytes ({:.1}%)",
                                usage.used_bytes, usage.quota_bytes, usage.percent
                            );
                        }
                        if let Some(notice) = Notice::from_health(&health) {
                            eprintln!("{}", notice);
                        }
                        println!();

                        if keys.is_empty() {
                            println!("No cached data.");
                        }
                        for k in &keys {
                            println!(
                                "{}  saved {}  backups {}",
                                k.key,
                                k.last_saved.as_deref().unwrap_or("never"),
                                k.backups
                            );
                        }
                    }
                }
                Ok(())
            }
            CacheSubcommand::Remove { key } => {
                if !ctx.cache.has_data(key) && ctx.cache.backup_keys(key).is_empty() {
                    return Err(format!("Nothing cached under '{}'", key).into());
                }
                if !ctx.cache.remove(key) {
                    return Err(format!("Failed to remove '{}' from the cache", key).into());
                }
                println!("Removed '{}' from the cache", key);
                Ok(())
            }
        }
    }
}
