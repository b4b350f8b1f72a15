//! OpenProject RS scheduling CLI
//!
//! Runs a scheduling pass against the configured database.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use op_core::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(name = "op-scheduling", version, about = "Reschedule OpenProject work packages")]
struct Cli {
    /// Configuration file layered under OPENPROJECT__* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where the working days calendar comes from.
    #[arg(long, global = true, value_enum, default_value_t = CalendarSource::Database)]
    calendar: CalendarSource,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CalendarSource {
    /// The `week_days` and `day_overrides` tables.
    Database,
    /// `scheduling.working_days` and `scheduling.non_working_dates`.
    Config,
}

#[derive(Subcommand)]
enum Command {
    /// Reschedule after weekdays or dates changed their working status.
    ApplyWorkingDaysChange {
        /// Changed ISO weekday (1 = Monday .. 7 = Sunday).
        #[arg(long = "weekday", value_parser = clap::value_parser!(u8).range(1..=7))]
        weekdays: Vec<u8>,

        /// Changed date (YYYY-MM-DD).
        #[arg(long = "date")]
        dates: Vec<NaiveDate>,
    },

    /// Reschedule ancestors after a work package changed its parent.
    UpdateAncestors {
        #[arg(long = "work-package")]
        work_package_id: i64,

        #[arg(long = "former-parent")]
        former_parent_id: Option<i64>,

        /// New parent; defaults to the parent stored in the database.
        #[arg(long = "parent")]
        parent_id: Option<i64>,

        /// The work package no longer has a parent.
        #[arg(long = "no-parent", conflicts_with = "parent_id")]
        no_parent: bool,
    },

    /// Dispatch a queued job by name with JSON arguments.
    RunJob {
        /// Job type, e.g. WorkPackages::UpdateAncestorsJob.
        name: String,

        /// Job arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path.to_str()),
        None => AppConfig::from_env(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting OpenProject RS scheduling"
    );

    commands::run(cli, config).await
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}
