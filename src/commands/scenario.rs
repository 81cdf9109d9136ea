use clap::{Args, Subcommand};

use troupe_core::Scenario;

use super::{join_or_dash, notice, print_json, warn_if_offline, OutputFormat};
use crate::context::AppContext;

#[derive(Args)]
pub struct ScenarioCommand {
    #[command(subcommand)]
    pub command: ScenarioSubcommand,
}

#[derive(Subcommand)]
pub enum ScenarioSubcommand {
    /// List scenarios
    List {
        /// Only scenarios that can currently be booked
        #[arg(long)]
        available: bool,

        /// Filter by author
        #[arg(long)]
        author: Option<String>,

        /// Case-insensitive title search
        #[arg(long)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a scenario
    Add {
        /// Scenario title
        title: String,

        /// Author
        #[arg(long, default_value = "")]
        author: String,

        /// Duration in minutes
        #[arg(long)]
        duration: Option<i64>,

        /// Minimum player count
        #[arg(long)]
        min_players: Option<i64>,

        /// Maximum player count
        #[arg(long)]
        max_players: Option<i64>,

        /// Genre (can be repeated)
        #[arg(long = "genre", value_name = "GENRE")]
        genres: Vec<String>,

        /// GM who can run it (can be repeated)
        #[arg(long = "gm", value_name = "NAME")]
        gms: Vec<String>,
    },

    /// Replace the GMs who can run a scenario
    Gms {
        /// Scenario title
        title: String,

        /// Staff names; none clears the list
        gms: Vec<String>,
    },
}

impl ScenarioCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ScenarioSubcommand::List {
                available,
                author,
                search,
                format,
            } => {
                let store = ctx.store::<Scenario>();
                store.refetch().await;
                warn_if_offline(ctx);

                let mut scenarios = if *available {
                    store.available()
                } else {
                    store.list()
                };
                if let Some(query) = search {
                    let needle = query.to_lowercase();
                    scenarios.retain(|s| s.title.to_lowercase().contains(&needle));
                }
                if let Some(author) = author {
                    scenarios.retain(|s| &s.author == author);
                }

                match format {
                    OutputFormat::Json => print_json(&scenarios)?,
                    OutputFormat::Text => {
                        if scenarios.is_empty() {
                            println!("No scenarios found.");
                        }
                        for s in &scenarios {
                            println!(
                                "{} [{}] by {}, {} players, {} min, GMs: {}",
                                s.title,
                                s.status.as_str(),
                                if s.author.is_empty() { "-" } else { s.author.as_str() },
                                s.players_label(),
                                s.duration,
                                join_or_dash(&s.available_gms)
                            );
                        }
                    }
                }
                Ok(())
            }
            ScenarioSubcommand::Add {
                title,
                author,
                duration,
                min_players,
                max_players,
                genres,
                gms,
            } => {
                let mut scenario = Scenario::new(title.trim(), author.trim());
                if let Some(duration) = duration {
                    scenario.duration = *duration;
                }
                if let Some(min) = min_players {
                    scenario.player_count_min = *min;
                }
                if let Some(max) = max_players {
                    scenario.player_count_max = *max;
                }
                scenario.genre = genres.clone();

                let store = ctx.store::<Scenario>();
                let created = store.create(&scenario).await.map_err(notice)?;
                println!("Created scenario: {} ({})", created.title, created.id);

                if !gms.is_empty() {
                    let updated = ctx
                        .coordinator()
                        .set_available_gms(&created, gms.clone())
                        .await
                        .map_err(notice)?;
                    println!("GMs: {}", join_or_dash(&updated.available_gms));
                }
                Ok(())
            }
            ScenarioSubcommand::Gms { title, gms } => {
                let coordinator = ctx.coordinator();
                coordinator.scenarios().refetch().await;
                let scenario = coordinator
                    .scenarios()
                    .find_by_title(title)
                    .ok_or_else(|| format!("Scenario not found: {}", title))?;

                let updated = coordinator
                    .set_available_gms(&scenario, gms.clone())
                    .await
                    .map_err(notice)?;
                println!(
                    "GMs for {}: {}",
                    updated.title,
                    join_or_dash(&updated.available_gms)
                );
                Ok(())
            }
        }
    }
}
