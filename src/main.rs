use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod error;
mod models;
mod report;
mod source;

use config::{DisplayArgs, ReportSettings};
use error::ReportError;
use report::OutputFormat;

#[derive(Parser)]
#[command(name = "team-course-progress")]
#[command(about = "Course completion reporting for learning teams", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(long, env = "TEAM_PROGRESS_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample team with courses and progress
    Seed,
    /// Import team rosters from a CSV file (team_name, full_name, email, role)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the teams a viewer owns or manages
    Teams {
        #[arg(long)]
        viewer: String,
    },
    /// Build the progress report for one team
    Report {
        #[arg(long)]
        team: Uuid,
        /// Only report if this user owns or manages the team
        #[arg(long)]
        viewer: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        display: DisplayArgs,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the learning platform's Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    debug!(max_connections = cli.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_roster(&pool, &csv).await?;
            println!("Added {inserted} team memberships from {}.", csv.display());
        }
        Commands::Teams { viewer } => {
            let teams = db::managed_teams(&pool, &viewer).await?;

            if teams.is_empty() {
                println!("You are not managing any teams.");
                return Ok(());
            }

            println!("Teams managed by {viewer}:");
            for team in teams {
                println!(
                    "- {} ({}) as {} with {} members",
                    team.name, team.id, team.role, team.member_count
                );
            }
        }
        Commands::Report {
            team,
            viewer,
            format,
            out,
            display,
        } => {
            let settings = ReportSettings::try_from(display)?;

            if let Some(viewer) = viewer {
                if !db::can_manage_team(&pool, &viewer, team).await? {
                    warn!(%viewer, %team, "viewer does not own or manage the team");
                    return Err(ReportError::PermissionDenied { viewer, team }.into());
                }
            }

            let source = db::PgProgressSource::new(pool.clone());
            let team_report = aggregate::build_team_report(&source, team, &settings).await?;
            let rendered = report::render(&team_report, format)?;

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "report written");
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}
