use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod aggregate;
mod classify;
mod config;
mod db;
mod engine;
mod error;
mod models;
mod report;
mod scorer;

use config::EngineConfig;

#[derive(Parser)]
#[command(name = "bee-momentum-engine")]
#[command(about = "Momentum scoring engine for BEE engagement events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import engagement events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score momentum for one user or every active user
    #[command(group(
        ArgGroup::new("scope")
            .args(["user", "all"])
            .required(true)
            .multiple(false)
    ))]
    Score {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        all: bool,
        /// Score as of this date (defaults to today, UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        lookback_days: Option<i64>,
        /// JSON file with engine tunables; omitted fields keep defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Cap how many users a --all run scores
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Generate a markdown momentum report for one user
    Report {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>, lookback_days: Option<i64>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::default(),
    };
    if let Some(days) = lookback_days {
        config.lookback_days = days;
    }
    config.validate()?;
    Ok(config)
}

/// Score one user, persist the results, and print a one-line summary.
async fn score_user(
    pool: &PgPool,
    user_id: Uuid,
    as_of: NaiveDate,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let since = as_of - Duration::days(config.lookback_days);
    let events = db::fetch_events(pool, user_id, since).await?;
    let evaluation = engine::evaluate(user_id, &events, as_of, config, Utc::now())?;

    for score in &evaluation.scores {
        let state = classify::zone_for(score.value);
        db::upsert_score(pool, score, state.as_str()).await?;
    }
    let recorded = db::insert_transitions(pool, &evaluation.classification.transitions).await?;

    println!(
        "- {} score {:.1} ({}) across {} events; {} new transitions, {} triggers",
        user_id,
        evaluation.latest.value,
        evaluation.classification.state,
        events.len(),
        recorded,
        evaluation.classification.triggers.len()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

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
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        Commands::Score {
            user,
            all,
            as_of,
            lookback_days,
            config,
            limit,
        } => {
            let config = load_config(config.as_ref(), lookback_days)?;
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

            if all {
                let since = as_of - Duration::days(config.lookback_days);
                let mut users = db::active_user_ids(&pool, since).await?;
                if users.is_empty() {
                    println!("No active users in this window.");
                    return Ok(());
                }
                if let Some(limit) = limit {
                    users.truncate(limit);
                }
                println!("Scoring {} users as of {}:", users.len(), as_of);
                let mut failed = 0usize;
                for user_id in users {
                    // One bad user must not sink the batch.
                    if let Err(err) = score_user(&pool, user_id, as_of, &config).await {
                        eprintln!("- {user_id} failed: {err:#}");
                        failed += 1;
                    }
                }
                if failed > 0 {
                    eprintln!("{failed} users failed; rerun is safe, scoring is idempotent.");
                }
            } else if let Some(user_id) = user {
                println!("Scoring momentum as of {as_of}:");
                score_user(&pool, user_id, as_of, &config).await?;
            }
        }
        Commands::Report {
            user,
            as_of,
            config,
            out,
        } => {
            let config = load_config(config.as_ref(), None)?;
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let since = as_of - Duration::days(config.lookback_days);
            let events = db::fetch_events(&pool, user, since).await?;
            let evaluation = engine::evaluate(user, &events, as_of, &config, Utc::now())?;
            let report = report::build_report(user, as_of, &evaluation);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
