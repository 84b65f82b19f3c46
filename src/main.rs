use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

mod auth;
mod config;
mod edit;
mod error;
mod identity;
mod models;
mod normalize;
mod query;
mod report;
mod sheet;
mod shell;
mod store;

use config::DashboardConfig;
use identity::IdentityIndex;
use models::{AcademicYear, AssessmentKind, SlotKey};
use store::DatasetStore;

#[derive(Parser)]
#[command(name = "supervisi-dashboard")]
#[command(about = "Teacher supervision scores from evaluation spreadsheets", long_about = None)]
struct Cli {
    /// Directory holding the evaluation workbooks
    #[arg(long, env = "SUPERVISI_DATA_DIR", default_value = ".", global = true)]
    data_dir: PathBuf,
    /// Optional TOML config (passwords, title list, sources)
    #[arg(long, env = "SUPERVISI_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every workbook and report what was found
    Check,
    /// Print the summary cards for one kind and year
    Summary {
        #[arg(long, default_value = "lesson-plan-review")]
        kind: AssessmentKind,
        /// Defaults to the earliest loaded year
        #[arg(long)]
        year: Option<AcademicYear>,
        #[arg(long)]
        json: bool,
    },
    /// List the canonical identifiers accepted at login
    Users,
    /// Generate a markdown report across all datasets
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Interactive dashboard session
    Shell,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let store = DatasetStore::load(&config, &cli.data_dir)
        .with_context(|| format!("failed to load datasets from {}", cli.data_dir.display()))?;
    info!(slots = store.slots().count(), "datasets ready");

    match cli.command {
        Commands::Check => {
            for key in store.slots() {
                let records = store.snapshot(key).await.unwrap_or_default();
                let cards = query::summary_cards(&records);
                println!(
                    "- {} {}: {} records, {} teachers",
                    key.kind.title(),
                    key.year,
                    records.len(),
                    cards.active_teachers
                );
            }
        }
        Commands::Summary { kind, year, json } => {
            let year = match year {
                Some(year) => year,
                None => query::year_options(&store, kind)
                    .first()
                    .copied()
                    .with_context(|| format!("no datasets loaded for {kind}"))?,
            };
            let records = store
                .snapshot(SlotKey::new(kind, year))
                .await
                .with_context(|| format!("no dataset loaded for {kind} {year}"))?;
            let cards = query::summary_cards(&records);

            if json {
                let value = serde_json::json!({
                    "kind": kind,
                    "year": year,
                    "active_teachers": cards.active_teachers,
                    "mean_value": cards.mean_value,
                    "top_indicator": cards.top_indicator,
                    "bottom_indicator": cards.bottom_indicator,
                    "top_teacher": cards.top_teacher,
                    "best_improvement": cards.best_improvement.as_ref().map(|i| &i.teacher),
                    "best_improvement_delta": cards.best_improvement.as_ref().map(|i| i.delta),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{} {}", kind.title(), year);
                print!("{}", report::render_cards(&cards));
            }
        }
        Commands::Users => {
            let index = IdentityIndex::build(&store.all_records().await, &config.identity.titles);
            if index.is_empty() {
                println!("No teachers found.");
            } else {
                println!("{} teacher accounts:", index.len());
            }
            for identifier in index.iter() {
                println!("{identifier}{}", config.auth.account_domain);
            }
        }
        Commands::Report { out } => {
            let mut slots = Vec::new();
            for key in store.slots() {
                slots.push((key, store.snapshot(key).await.unwrap_or_default()));
            }
            let report = report::build_report(chrono::Utc::now(), &slots);
            std::fs::write(&out, report).with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Shell => {
            shell::Shell::new(&store, &config).run().await?;
        }
    }

    Ok(())
}
