//! Command-line entry point for the candle ingestion pipeline.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use candlefill::{Candlefill, IngestError, Settings};
use candlefill_fs::{
    CsvCandleRepository, CsvControlFile, CsvInstrumentList, CsvResumeLedger, CsvStatusFile,
    load_instrument_list, write_instrument_list,
};
use candlefill_gecko::GeckoSource;

#[derive(Parser, Debug)]
#[command(name = "candlefill", version, about = "Gap-aware, resumable OHLCV candle ingestion")]
struct Cli {
    /// TOML settings file; defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep every listed instrument up to date until the run signal turns off.
    Run {
        /// Execute a single rotation and exit.
        #[arg(long)]
        once: bool,
    },
    /// Walk deep history for instruments not yet in the resume ledger.
    Backfill {
        /// Instrument list to walk; defaults to the configured list.
        #[arg(long)]
        instruments: Option<PathBuf>,
        /// Write the instruments already walked to this file.
        #[arg(long)]
        tracked_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, fatal = e.is_fatal(), "candlefill stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), IngestError> {
    let settings = Settings::load(cli.config.as_deref())?;
    let paths = &settings.paths;

    let source = Arc::new(GeckoSource::new(&settings.source)?);
    let builder = Candlefill::builder()
        .config(settings.pipeline())
        .with_source(source)
        .with_repository(Arc::new(CsvCandleRepository::new(&paths.store)))
        .with_control(Arc::new(CsvControlFile::new(&paths.control)));

    match cli.command {
        Command::Run { once } => {
            let app = builder
                .with_status(Arc::new(CsvStatusFile::new(&paths.status)))
                .with_instruments(Arc::new(CsvInstrumentList::new(
                    &paths.instruments,
                    &paths.instrument_column,
                )))
                .build()?;
            let mut ingest = app.ingestion_loop();
            if once {
                let report = ingest.run_once().await?;
                tracing::info!(
                    instruments = report.instruments.len(),
                    rows_added = report.rows_added(),
                    stopped = report.stopped,
                    "rotation finished"
                );
                Ok(())
            } else {
                ingest.run().await
            }
        }
        Command::Backfill {
            instruments,
            tracked_out,
        } => {
            let list = instruments.unwrap_or_else(|| paths.instruments.clone());
            let ids = load_instrument_list(&list, &paths.instrument_column)?;
            let app = builder
                .with_ledger(Arc::new(CsvResumeLedger::open(&paths.ledger)?))
                .build()?;
            let backfill = app.backfill()?;
            let report = backfill.run(&ids).await?;
            tracing::info!(
                instruments = report.entries.len(),
                completed = report.completed().count(),
                already_done = report.skipped(),
                stopped = report.stopped,
                "backfill finished"
            );

            if let Some(out) = tracked_out.or_else(|| paths.tracked_out.clone()) {
                let tracked = backfill.tracked(&ids);
                write_instrument_list(&out, &paths.instrument_column, &tracked)?;
                tracing::info!(path = %out.display(), count = tracked.len(), "tracked list written");
            }
            Ok(())
        }
    }
}
