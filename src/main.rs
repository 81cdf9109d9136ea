use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod context;

use commands::{
    CacheCommand, ConfigCommand, HistoryCommand, ScenarioCommand, ScheduleCommand, StaffCommand,
    WatchCommand,
};
use config::Config;
use context::AppContext;

#[derive(Parser)]
#[command(name = "troupe")]
#[command(version)]
#[command(about = "Operations console for a mystery game venue chain", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Do not contact the backend; read from the local cache only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the scenario catalog
    Scenario(ScenarioCommand),

    /// Manage the staff roster
    Staff(StaffCommand),

    /// Show the event schedule
    Schedule(ScheduleCommand),

    /// Show the edit history
    History(HistoryCommand),

    /// Inspect or clear the local cache
    Cache(CacheCommand),

    /// Follow live changes to a table
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let ctx = AppContext::connect(config, cli.offline).await;

    match command {
        Commands::Scenario(cmd) => cmd.run(&ctx).await?,
        Commands::Staff(cmd) => cmd.run(&ctx).await?,
        Commands::Schedule(cmd) => cmd.run(&ctx).await?,
        Commands::History(cmd) => cmd.run(&ctx).await?,
        Commands::Cache(cmd) => cmd.run(&ctx)?,
        Commands::Watch(cmd) => cmd.run(&ctx).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}
