//! Sarkari Crawler CLI
//!
//! Local execution entry point: scrape-and-print, scrape-and-persist,
//! and query subcommands.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sarkari_crawler::{
    error::Result,
    models::{Config, PageType},
    output,
    pipeline::Pipeline,
    store::{QueryFilter, RecordStore, SqliteStore},
};

/// Sarkari Crawler - government job listing scraper
#[derive(Parser, Debug)]
#[command(
    name = "sarkari",
    version,
    about = "Scrapes government job listings, results, admit cards and answer keys"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape a page and print (or write) the records as JSON
    Scrape {
        /// Page type: jobs, results, admit_cards, answer_keys, or a
        /// detail type (recruitment, result, answer_key, exam_city)
        page_type: PageType,

        /// URL to scrape (defaults to the configured aggregator page)
        #[arg(long)]
        url: Option<String>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also fetch linked detail pages
        #[arg(long)]
        follow_details: bool,
    },

    /// Scrape a page and upsert the records into storage
    Persist {
        page_type: PageType,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        follow_details: bool,
    },

    /// Read records back from storage
    Query {
        /// Restrict to one page type
        #[arg(long)]
        page_type: Option<PageType>,

        /// Substring to look for in stored records
        #[arg(long)]
        contains: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(clean) if clean => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run finished without unrecovered failures.
async fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Scrape {
            page_type,
            url,
            output: output_path,
            follow_details,
        } => {
            config.scrape.follow_details = follow_details;
            let config = Arc::new(config);
            let url = resolve_url(&config, page_type, url)?;

            let pipeline = Pipeline::from_config(Arc::clone(&config))?;
            let report = pipeline.run(page_type, &url).await?;
            print_summary(&report.summary);

            match output_path {
                Some(path) => {
                    output::write_json(&path, &report.outcomes).await?;
                    log::info!("{} record(s) written to {:?}", report.outcomes.len(), path);
                }
                None => println!("{}", output::to_json_string(&report.outcomes)?),
            }
            Ok(report.summary.is_clean())
        }

        Command::Persist {
            page_type,
            url,
            follow_details,
        } => {
            config.scrape.follow_details = follow_details;
            let config = Arc::new(config);
            let url = resolve_url(&config, page_type, url)?;

            let store = Arc::new(SqliteStore::connect(&config.database.url).await?);
            let pipeline = Pipeline::from_config(Arc::clone(&config))?.with_store(store);
            let report = pipeline.run(page_type, &url).await?;
            print_summary(&report.summary);
            log::info!("{} record(s) processed", report.outcomes.len());
            Ok(report.summary.is_clean())
        }

        Command::Query {
            page_type,
            contains,
            limit,
        } => {
            let store = SqliteStore::connect(&config.database.url).await?;
            let filter = QueryFilter {
                page_type,
                contains,
            };
            let records = store.query(&filter, limit).await?;
            for stored in &records {
                println!(
                    "[{}] {} {} ({})",
                    stored.record.page_type(),
                    stored.record.title().unwrap_or("(untitled)"),
                    stored.record.source_url(),
                    stored.confidence.as_str(),
                );
            }
            log::info!("{} record(s) matched", records.len());
            Ok(true)
        }
    }
}

fn resolve_url(config: &Config, page_type: PageType, url: Option<String>) -> Result<String> {
    url.or_else(|| config.aggregator_url(page_type))
        .ok_or_else(|| {
            sarkari_crawler::error::AppError::config(format!(
                "--url is required for detail page type '{page_type}'"
            ))
        })
}

fn print_summary(summary: &sarkari_crawler::models::RunSummary) {
    log::info!(
        "run summary: {} succeeded, {} warned, {} failed",
        summary.succeeded,
        summary.warned,
        summary.failed
    );
    for failure in &summary.failures {
        log::warn!("  failed [{}] {}: {}", failure.kind, failure.url, failure.message);
    }
}
