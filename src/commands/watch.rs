use std::time::Duration;

use chrono::Local;
use clap::{Args, ValueEnum};
use serde::Serialize;

use troupe_core::{
    EditHistoryEntry, EntityAdapter, MountedTable, Notice, Scenario, ScheduleEvent, Staff, Store,
};

use super::{print_json, OutputFormat};
use crate::context::AppContext;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, ValueEnum)]
pub enum WatchTable {
    Scenarios,
    Staff,
    Stores,
    Schedule,
    History,
}

#[derive(Args)]
pub struct WatchCommand {
    /// Table to watch
    #[arg(value_enum)]
    pub table: WatchTable,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl WatchCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match self.table {
            WatchTable::Scenarios => {
                watch::<Scenario, _>(ctx, &self.format, |s| {
                    format!("{} [{}]", s.title, s.status.as_str())
                })
                .await
            }
            WatchTable::Staff => {
                watch::<Staff, _>(ctx, &self.format, |s| {
                    format!("{} [{}]", s.name, s.status.as_str())
                })
                .await
            }
            WatchTable::Stores => {
                watch::<Store, _>(ctx, &self.format, |s| {
                    format!("{} ({})", s.name, s.short_name)
                })
                .await
            }
            WatchTable::Schedule => {
                watch::<ScheduleEvent, _>(ctx, &self.format, |e| {
                    let day = e.date.map(|d| d.to_string()).unwrap_or_default();
                    format!("{} {} {} @ {}", day, e.start_time, e.scenario, e.venue)
                })
                .await
            }
            WatchTable::History => {
                watch::<EditHistoryEntry, _>(ctx, &self.format, |e| {
                    format!("{} {} {}", e.user, e.action.as_str(), e.target)
                })
                .await
            }
        }
    }
}

/// Mounts the table and prints its list whenever the records change, until
/// interrupted.
async fn watch<A, F>(
    ctx: &AppContext,
    format: &OutputFormat,
    label: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    A: EntityAdapter + Serialize,
    F: Fn(&A) -> String,
{
    let store = ctx.store::<A>();
    let mounted = MountedTable::mount(store.sync().clone()).await;

    let print = |entities: &[A]| -> Result<(), Box<dyn std::error::Error>> {
        match format {
            OutputFormat::Json => print_json(entities)?,
            OutputFormat::Text => {
                println!(
                    "--- {} {} ({} rows)",
                    Local::now().format("%H:%M:%S"),
                    A::TABLE,
                    entities.len()
                );
                for entity in entities {
                    println!("{}", label(entity));
                }
            }
        }
        Ok(())
    };

    print(&store.list())?;

    if !mounted.is_subscribed() {
        eprintln!(
            "{}",
            Notice::warning(format!("Not subscribed to '{}'; showing cached data", A::TABLE))
        );
        return Ok(());
    }
    if let Some(error) = mounted.sync().error() {
        eprintln!("{}", Notice::error(error));
    }

    let mut last = mounted.sync().records();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                let current = mounted.sync().records();
                if current != last {
                    print(&store.list())?;
                    last = current;
                }
            }
        }
    }

    mounted.unmount().await;
    Ok(())
}
