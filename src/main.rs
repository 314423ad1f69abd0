use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use learning_advisor::advisor::{LearningAdvisor, DEFAULT_RECOMMENDATION_COUNT};
use learning_advisor::config::EngineConfig;
use learning_advisor::models::LearnerProfile;
use learning_advisor::{db, report, scoring};

#[derive(Parser)]
#[command(name = "learning-advisor")]
#[command(about = "Learner scoring and course recommendations", long_about = None)]
struct Cli {
    /// TOML file overriding scoring, ensemble and path settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the course catalog and sample learners
    Seed,
    /// Import learner activities from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score a learner's activity history
    Score {
        #[arg(long)]
        learner: String,
        #[arg(long)]
        json: bool,
    },
    /// Recommend courses for a learner
    Recommend {
        #[arg(long)]
        learner: String,
        #[arg(long, default_value_t = DEFAULT_RECOMMENDATION_COUNT)]
        count: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report for a learner
    Report {
        #[arg(long)]
        learner: String,
        #[arg(long, default_value_t = DEFAULT_RECOMMENDATION_COUNT)]
        count: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Rank every learner in a cohort
    Compare {
        #[arg(long)]
        cohort: String,
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn require_learner(pool: &sqlx::PgPool, learner_id: &str) -> anyhow::Result<LearnerProfile> {
    db::fetch_learner(pool, learner_id)
        .await?
        .with_context(|| format!("learner {learner_id} not found"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let advisor = LearningAdvisor::new(load_config(cli.config.as_ref())?);

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
            println!("Inserted {inserted} activities from {}.", csv.display());
        }
        Commands::Score { learner, json } => {
            let learner = require_learner(&pool, &learner).await?;
            let profile = advisor.score(&learner, Utc::now());

            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }

            println!(
                "{} scored {:.2} ({}) from {} activities",
                learner.id,
                profile.overall_score,
                profile.performance_level,
                learner.activities.len()
            );
            for (component, value) in profile.component_scores.entries() {
                println!("- {}: {:.2}", component.label(), value);
            }
            for insight in &profile.insights {
                println!("- {insight}");
            }
        }
        Commands::Recommend {
            learner,
            count,
            json,
        } => {
            let learner = require_learner(&pool, &learner).await?;
            let catalog = db::fetch_catalog(&pool).await?;
            let result = advisor.advise(&learner, &catalog, count, Utc::now());

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            if result.recommendations.is_empty() {
                println!("No courses matched this learner.");
                return Ok(());
            }

            println!(
                "Top courses for {} ({}):",
                learner.id, result.score_profile.performance_level
            );
            for recommendation in &result.recommendations {
                println!(
                    "- {} ({}) match {:.2}: {}",
                    recommendation.course.title,
                    recommendation.course.difficulty,
                    recommendation.match_score,
                    recommendation.rationale
                );
            }
        }
        Commands::Report {
            learner,
            count,
            out,
        } => {
            let learner = require_learner(&pool, &learner).await?;
            let catalog = db::fetch_catalog(&pool).await?;
            let result = advisor.advise(&learner, &catalog, count, Utc::now());
            std::fs::write(&out, report::build_report(&result))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Compare { cohort, json } => {
            let learners = db::fetch_learners_in_cohort(&pool, &cohort).await?;
            let as_of = Utc::now();
            let profiles: Vec<_> = learners
                .iter()
                .map(|learner| advisor.score(learner, as_of))
                .collect();

            let comparison = match scoring::compare_learners(&profiles) {
                Ok(comparison) => comparison,
                Err(err) => {
                    println!("Cohort {cohort}: {err}.");
                    return Ok(());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                print!("{}", report::build_cohort_report(&cohort, &comparison));
            }
        }
    }

    Ok(())
}
