use anyhow::Context;
use clap::{Parser, Subcommand};
use otomoto_etl::config::{Config, RunParams};
use otomoto_etl::pipeline::EtlPipeline;
use otomoto_etl::scrapers::{ExtractionEngine, HttpFetcher, OtomotoAdapter, UserAgentPool};
use otomoto_etl::sink::JsonLinesSink;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "otomoto-etl", about = "Harvest otomoto.pl car listings into a warehouse table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output table (newline-delimited JSON)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full backfill of every listing, appended
    Full {
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Listings added since yesterday, with politeness delays
    Daily {
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Run with parameters from a JSON config file
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.command {
        Commands::Full { brand, model } => Config::new(RunParams {
            brand: brand.clone(),
            model: model.clone(),
            ..RunParams::full_backfill()
        }),
        Commands::Daily { brand, model } => Config::new(RunParams {
            brand: brand.clone(),
            model: model.clone(),
            ..RunParams::daily()
        }),
        Commands::Run { config } => Config::load(config)?,
    };
    if let Some(output) = &cli.output {
        config.engine.output = output.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    info!("🚗 otomoto ETL: {:?}", config.run);

    let fetcher = HttpFetcher::with_timeout(config.engine.request_timeout())?;
    let engine = ExtractionEngine::new(fetcher, OtomotoAdapter::new(), UserAgentPool::new())
        .with_options(config.engine.engine_options(&config.run));
    let pipeline = EtlPipeline::new(engine);

    let sink = Box::new(JsonLinesSink::new(&config.engine.output));
    let summary = pipeline
        .run(&config.run, sink)
        .await
        .context("ETL run failed")?;

    info!(
        "✅ {} rows loaded into {} ({} of {} pages visited, {} failed, forced stop: {})",
        summary.rows_loaded,
        config.engine.output.display(),
        summary.pages_visited,
        summary.pages_planned,
        summary.failed_pages.len(),
        summary.forced_stop
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
