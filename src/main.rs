use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use ts_replicator::cli::Cli;
use ts_replicator::replication::{replicate_time_series, ReplicationReport};
use ts_replicator::store::SnapshotProject;

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(report: &ReplicationReport) {
    println!(
        "{} {} -> {}",
        "Replicated".bold(),
        report.project_source,
        report.project_destination
    );
    println!(
        "  created {}, updated {}, skipped {}",
        report.created.to_string().green(),
        report.updated.to_string().green(),
        report.filtered
    );
    if !report.deleted_stale.is_empty() || !report.deleted_unreplicated.is_empty() {
        println!(
            "  deleted {} stale, {} unreplicated",
            report.deleted_stale.len().to_string().yellow(),
            report.deleted_unreplicated.len().to_string().yellow()
        );
    }
    for failure in &report.failed_chunks {
        println!(
            "  {} chunk {} ({} records): {}",
            "failed".red().bold(),
            failure.chunk,
            failure.source_ids.len(),
            failure.error
        );
    }
    for error in &report.cleanup_errors {
        println!("  {} {}", "failed".red().bold(), error);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let config = cli.resolve_config().context("Invalid configuration")?;

    let source = SnapshotProject::open(&cli.source)
        .with_context(|| format!("Failed to load source {}", cli.source.display()))?;
    let destination = SnapshotProject::open_locked(&cli.destination)
        .with_context(|| format!("Failed to load destination {}", cli.destination.display()))?;

    let report = replicate_time_series(
        &source.time_series,
        &destination.time_series,
        &destination.assets,
        &config.to_options(),
    )
    .await?;

    // Chunks that did succeed are kept even on a partial run.
    destination
        .save()
        .with_context(|| format!("Failed to write {}", cli.destination.display()))?;
    drop(destination);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if !cli.quiet {
        print_summary(&report);
    }

    if report.is_partial() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
