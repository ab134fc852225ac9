use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dailypress::config::Config;

mod commands;

use commands::Runtime;

#[derive(Parser)]
#[command(
    name = "dailypress",
    version,
    about = "Scheduled multi-site blog publishing with LLM-generated content",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true, env = "DAILYPRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the nightly, recovery and weekly triggers until Ctrl-C
    Daemon {
        /// Also serve the operational API
        #[arg(long, default_value = "false")]
        with_api: bool,
    },

    /// Publish a day's slots now
    Run {
        /// Date to publish (YYYY-MM-DD), today when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Limit the run to these sites
        #[arg(short, long)]
        site: Vec<String>,
    },

    /// Reclassify stalled slots and retry unpublished ones
    Recover {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Fill missing slots of a week
    PlanWeek {
        /// Any date inside the week, today when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Plan the week after the given one
        #[arg(long, default_value = "false")]
        next: bool,
    },

    /// Delete and re-plan every slot of a week
    RecreateWeek {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Move a failed slot back to planned
    ResetSlot {
        #[arg(short, long)]
        date: NaiveDate,

        #[arg(short, long)]
        site: String,

        #[arg(short, long)]
        category: String,
    },

    /// Show a day's slots, next trigger times and recent attempts
    Status {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Serve the operational API without triggers
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = dailypress::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    tracing::info!(sites = config.sites.len(), "dailypress starting");
    let rt = Runtime::build(config)?;

    match cli.command {
        Commands::Daemon { with_api } => commands::daemon(rt, with_api).await?,
        Commands::Run { date, site } => commands::run(&rt, date, site).await?,
        Commands::Recover { date } => commands::recover(&rt, date).await?,
        Commands::PlanWeek { date, next } => commands::plan_week(&rt, date, next)?,
        Commands::RecreateWeek { date } => commands::recreate_week(&rt, date)?,
        Commands::ResetSlot {
            date,
            site,
            category,
        } => commands::reset_slot(&rt, date, &site, &category)?,
        Commands::Status { date } => commands::status(&rt, date)?,
        Commands::Serve => commands::serve(rt).await?,
    }

    Ok(())
}

/// Setup tracing subscriber
fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("dailypress=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("dailypress={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
