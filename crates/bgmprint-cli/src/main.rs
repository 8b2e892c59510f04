// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use bgmprint_application::{
    EventSink, IdentityResolver, IngestEvent, IngestionAbort, IngestionPipeline, ItemOutcome,
    QueryPipeline, ResultFilter,
};
use bgmprint_config::{load as load_config, AppConfig, TelemetryConfig};
use bgmprint_domain::MatchResult;
use bgmprint_fingerprint::{AudioDecoder, ChromaprintEngine, FingerprintingEngine, SymphoniaDecoder};
use bgmprint_infrastructure::{open_store, FingerprintStore, SqliteFingerprintStore};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Audio fingerprint indexing and lookup.
#[derive(Debug, Parser)]
#[command(name = "bgmprint", version, arg_required_else_help = true)]
struct Cli {
    /// TOML configuration file layered over the defaults
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fingerprint every file of a directory into the store
    Fingerprint { directory: PathBuf },
    /// Look up an audio file in the store
    Query { file: PathBuf },
    /// Delete every track from the store
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage problems are reported, not treated as failures.
            let _ = err.print();
            return Ok(());
        }
    };

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let outcome = execute(cli.command, &config, &cancel).await;
    watcher.abort();

    if cancel.is_cancelled() {
        eprintln!("Interrupted");
        std::process::exit(1);
    }
    outcome
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Open the store, run `command` unless interrupted meanwhile, then close the store.
async fn execute(command: Command, config: &AppConfig, cancel: &CancellationToken) -> Result<()> {
    let store = open_store(&config.store).await?;

    let outcome = if cancel.is_cancelled() {
        info!(target: "cli", "interrupted while opening the store");
        Ok(())
    } else {
        run(command, config, &store, cancel.clone()).await
    };

    store.close().await;
    outcome
}

async fn run(
    command: Command,
    config: &AppConfig,
    store: &SqliteFingerprintStore,
    cancel: CancellationToken,
) -> Result<()> {
    let engine: Arc<dyn FingerprintingEngine> = Arc::new(ChromaprintEngine::new());
    let decoder: Arc<dyn AudioDecoder> = Arc::new(SymphoniaDecoder::new());

    match command {
        Command::Fingerprint { directory } => {
            let pipeline = IngestionPipeline::new(
                IdentityResolver::default(),
                engine,
                decoder,
                store,
                &config.ingest,
            )
            .with_events(Arc::new(ConsoleEventSink))
            .with_cancellation(cancel);
            fingerprint_directory(&pipeline, &directory).await
        }
        Command::Query { file } => {
            let pipeline = QueryPipeline::new(
                engine,
                decoder,
                store,
                ResultFilter::new(config.query.min_confidence),
            )
            .with_cancellation(cancel);
            query_file(&pipeline, &file, config.query.register_matches).await
        }
        Command::Purge { yes } => purge(store, yes).await,
    }
}

async fn fingerprint_directory(pipeline: &IngestionPipeline<'_>, directory: &Path) -> Result<()> {
    let report = match pipeline.ingest(directory).await {
        Ok(report) => report,
        Err(IngestionAbort::InvalidFileNames(failures)) => {
            for failure in &failures {
                eprintln!("{}", failure);
            }
            return Ok(());
        }
        Err(abort) => return Err(abort.into()),
    };

    for error in &report.errors {
        eprintln!("{}", error);
    }
    info!(
        target: "cli",
        inserted = report.inserted_count,
        skipped = report.skipped_count,
        failed = report.errors.len(),
        "fingerprint finished"
    );
    Ok(())
}

async fn query_file(pipeline: &QueryPipeline<'_>, file: &Path, register: bool) -> Result<()> {
    let matches: Vec<MatchResult> = pipeline.query_match(file).await?.collect();
    for found in &matches {
        println!("{}", found);
    }
    if register && !matches.is_empty() {
        pipeline.register_matches(file, &matches).await?;
    }
    Ok(())
}

async fn purge(store: &SqliteFingerprintStore, confirmed: bool) -> Result<()> {
    if !confirmed {
        eprintln!("Refusing to delete every track without --yes");
        return Ok(());
    }
    let deleted = store.delete_all().await?;
    println!("Deleted {} tracks.", deleted);
    Ok(())
}

/// Prints one progress line per processed file.
struct ConsoleEventSink;

impl EventSink for ConsoleEventSink {
    fn publish(&self, event: &IngestEvent) {
        let line = progress_line(event);
        match event.outcome {
            ItemOutcome::Failed { .. } => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

fn progress_line(event: &IngestEvent) -> String {
    let prefix = format!("[{}/{}]", event.index, event.total);
    match &event.outcome {
        ItemOutcome::Inserted {
            identity,
            sub_fingerprints,
        } => format!("{} Inserted {} with {} fingerprints.", prefix, identity, sub_fingerprints),
        ItemOutcome::Skipped { identity } => {
            format!("{} Already inserted {}. Skipping.", prefix, identity)
        }
        ItemOutcome::Failed { raw_file_name } => {
            format!("{} Failed to ingest {}", prefix, raw_file_name)
        }
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    match shutdown_signal().await {
        Ok(()) => {
            info!(target: "cli", "shutdown signal received");
            cancel.cancel();
        }
        Err(err) => warn!(target: "cli", error = %err, "cannot listen for shutdown signals"),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgmprint_domain::TrackIdentity;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fingerprint_directory() {
        let cli = Cli::try_parse_from(["bgmprint", "fingerprint", "music"]).unwrap();
        assert!(cli.config.is_none());
        match cli.command {
            Command::Fingerprint { directory } => assert_eq!(directory, PathBuf::from("music")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_query_with_global_config() {
        let cli =
            Cli::try_parse_from(["bgmprint", "query", "clip.mp3", "--config", "bgm.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("bgm.toml")));
        assert!(matches!(cli.command, Command::Query { file } if file == PathBuf::from("clip.mp3")));
    }

    #[test]
    fn purge_requires_explicit_flag() {
        let cli = Cli::try_parse_from(["bgmprint", "purge"]).unwrap();
        assert!(matches!(cli.command, Command::Purge { yes: false }));

        let cli = Cli::try_parse_from(["bgmprint", "purge", "--yes"]).unwrap();
        assert!(matches!(cli.command, Command::Purge { yes: true }));
    }

    #[test]
    fn missing_arguments_are_usage_errors() {
        assert!(Cli::try_parse_from(["bgmprint"]).is_err());
        assert!(Cli::try_parse_from(["bgmprint", "fingerprint"]).is_err());
        assert!(Cli::try_parse_from(["bgmprint", "query"]).is_err());
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        assert!(Cli::try_parse_from(["bgmprint", "index", "music"]).is_err());
    }

    #[test]
    fn progress_lines() {
        let identity = TrackIdentity::new("dova-s", "xyz-1");
        let inserted = IngestEvent {
            index: 1,
            total: 2,
            outcome: ItemOutcome::Inserted {
                identity: identity.clone(),
                sub_fingerprints: 250,
            },
        };
        assert_eq!(
            progress_line(&inserted),
            "[1/2] Inserted dova-s/xyz-1 with 250 fingerprints."
        );

        let skipped = IngestEvent {
            index: 2,
            total: 2,
            outcome: ItemOutcome::Skipped { identity },
        };
        assert_eq!(
            progress_line(&skipped),
            "[2/2] Already inserted dova-s/xyz-1. Skipping."
        );

        let failed = IngestEvent {
            index: 3,
            total: 3,
            outcome: ItemOutcome::Failed {
                raw_file_name: "C[t3]".to_string(),
            },
        };
        assert_eq!(progress_line(&failed), "[3/3] Failed to ingest C[t3]");
    }

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.store.url = "sqlite::memory:".to_string();
        config
    }

    #[tokio::test]
    async fn interrupt_during_open_skips_the_command() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let command = Command::Fingerprint {
            directory: PathBuf::from("/nonexistent/bgmprint-input"),
        };

        let outcome = execute(command, &memory_config(), &cancel).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn command_runs_when_not_interrupted() {
        let cancel = CancellationToken::new();
        let command = Command::Fingerprint {
            directory: PathBuf::from("/nonexistent/bgmprint-input"),
        };

        let err = execute(command, &memory_config(), &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cannot read directory"));
    }

    #[cfg(unix)]
    #[test]
    fn unix_signal_kinds_available() {
        use tokio::signal::unix::SignalKind;
        let _ = SignalKind::interrupt();
        let _ = SignalKind::terminate();
    }
}
