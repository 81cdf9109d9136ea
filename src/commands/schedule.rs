use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};

use troupe_core::ScheduleEvent;

use super::{join_or_dash, print_json, warn_if_offline, OutputFormat};
use crate::context::AppContext;

#[derive(Args)]
pub struct ScheduleCommand {
    #[command(subcommand)]
    pub command: ScheduleSubcommand,
}

#[derive(Subcommand)]
pub enum ScheduleSubcommand {
    /// List events
    List {
        /// Only events on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only events at this venue
        #[arg(long)]
        venue: Option<String>,

        /// Only events this GM is assigned to
        #[arg(long)]
        gm: Option<String>,

        /// Only non-cancelled events from today on
        #[arg(long)]
        upcoming: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ScheduleCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ScheduleSubcommand::List {
                date,
                venue,
                gm,
                upcoming,
                format,
            } => {
                let schedule = ctx.store::<ScheduleEvent>();
                schedule.refetch().await;
                warn_if_offline(ctx);

                let mut events = match (date, upcoming) {
                    (Some(day), _) => schedule.on_date(*day),
                    (None, true) => schedule.upcoming(Local::now().date_naive()),
                    (None, false) => schedule.list(),
                };
                if let Some(venue) = venue {
                    events.retain(|e| &e.venue == venue);
                }
                if let Some(gm) = gm {
                    events.retain(|e| e.gms.iter().any(|g| g == gm));
                }

                match format {
                    OutputFormat::Json => print_json(&events)?,
                    OutputFormat::Text => {
                        if events.is_empty() {
                            println!("No events found.");
                        }
                        for e in &events {
                            let day = e
                                .date
                                .map(|d| d.format("%Y-%m-%d").to_string())
                                .unwrap_or_else(|| "????-??-??".to_string());
                            println!(
                                "{} {}-{} {} @ {} [{}] GMs: {}{}",
                                day,
                                e.start_time,
                                e.end_time,
                                e.scenario,
                                e.venue,
                                e.category.as_str(),
                                join_or_dash(&e.gms),
                                if e.is_cancelled { " (cancelled)" } else { "" }
                            );
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
