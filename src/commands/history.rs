use clap::{Args, Subcommand};

use troupe_core::EditHistoryEntry;

use super::{print_json, warn_if_offline, OutputFormat};
use crate::context::AppContext;

#[derive(Args)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub command: HistorySubcommand,
}

#[derive(Subcommand)]
pub enum HistorySubcommand {
    /// Show recent edits, newest first
    List {
        /// Only this area (staff, scenario, schedule, ...)
        #[arg(long)]
        category: Option<String>,

        /// Only edits to this target
        #[arg(long)]
        target: Option<String>,

        /// Maximum number of entries
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl HistoryCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            HistorySubcommand::List {
                category,
                target,
                limit,
                format,
            } => {
                let history = ctx.store::<EditHistoryEntry>();
                history.refetch().await;
                warn_if_offline(ctx);

                let mut entries = history.recent(usize::MAX);
                if let Some(category) = category {
                    entries.retain(|e| &e.category == category);
                }
                if let Some(target) = target {
                    entries.retain(|e| &e.target == target);
                }
                entries.truncate(*limit);

                match format {
                    OutputFormat::Json => print_json(&entries)?,
                    OutputFormat::Text => {
                        if entries.is_empty() {
                            println!("No history entries.");
                        }
                        for e in &entries {
                            let when = e
                                .created_at
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                                .unwrap_or_default();
                            println!(
                                "{} {} {} {} ({}): {}",
                                when,
                                e.user,
                                e.action.as_str(),
                                e.target,
                                e.category,
                                e.summary
                            );
                            for change in &e.changes {
                                println!(
                                    "    {}: {} -> {}",
                                    change.field,
                                    change.old_value.as_deref().unwrap_or("-"),
                                    change.new_value.as_deref().unwrap_or("-")
                                );
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
