mod cache_cmd;
mod config_cmd;
mod history;
mod scenario;
mod schedule;
mod staff;
mod watch;

pub use cache_cmd::CacheCommand;
pub use config_cmd::ConfigCommand;
pub use history::HistoryCommand;
pub use scenario::ScenarioCommand;
pub use schedule::ScheduleCommand;
pub use staff::StaffCommand;
pub use watch::WatchCommand;

use clap::ValueEnum;
use serde::Serialize;
use troupe_core::{Notice, SyncError};

use crate::context::AppContext;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Turns a sync error into the notice text shown to the user.
pub(crate) fn notice(err: SyncError) -> Box<dyn std::error::Error> {
    Notice::from_sync_error(&err).to_string().into()
}

/// Warns on stderr when listings come from the local cache.
pub(crate) fn warn_if_offline(ctx: &AppContext) {
    if !ctx.is_connected() {
        eprintln!(
            "{}",
            Notice::warning("Offline: showing cached data, changes cannot be saved")
        );
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(
    value: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
