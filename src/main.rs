use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mend::config::MendConfig;
use mend::repair::{Rejection, RepairOutcome};
use mend::tracer::ExecutionReport;

#[derive(Parser)]
#[command(name = "mend", about = "Watch a program and repair it when it fails")]
struct Cli {
    /// Configuration file (default: ./mend.yaml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the target and repair it on failure until Ctrl-C.
    Watch {
        /// Overrides `target` from the config.
        target: Option<PathBuf>,
    },
    /// Trace a file once and print the report.
    Trace {
        file: PathBuf,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Trace the target once and run a single repair cycle if it fails.
    Repair { target: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mend=info")),
        )
        .with_target(false)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = MendConfig::resolve(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Command::Watch { target } => {
            if let Some(t) = target {
                config.target = t;
            }
            let monitor = mend::build_monitor(&config).context("building generator")?;
            mend::monitor::run(Arc::new(monitor))
                .await
                .with_context(|| format!("watching {}", config.target.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Trace { file, json } => {
            let report = mend::build_tracer(&config)
                .run(&file)
                .await
                .with_context(|| format!("tracing {}", file.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&report);
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Repair { target } => {
            if let Some(t) = target {
                config.target = t;
            }
            repair_once(&config).await
        }
    }
}

async fn repair_once(config: &MendConfig) -> anyhow::Result<ExitCode> {
    let coordinator = mend::build_coordinator(config).context("building generator")?;
    let report = coordinator
        .tracer()
        .run(&config.target)
        .await
        .with_context(|| format!("tracing {}", config.target.display()))?;

    if report.is_success() {
        info!("integrity OK, nothing to repair");
        return Ok(ExitCode::SUCCESS);
    }
    warn!("crash: {}", report.error_headline());

    match coordinator.attempt_repair(&report, &config.target).await? {
        RepairOutcome::Applied(_) => {
            info!("repaired {}", config.target.display());
            Ok(ExitCode::SUCCESS)
        }
        RepairOutcome::Rejected(Rejection::Verification(candidate)) => {
            warn!(
                "candidate failed verification:\n{}",
                candidate.verify_report.error_text()
            );
            Ok(ExitCode::FAILURE)
        }
        RepairOutcome::Rejected(Rejection::Generation(e)) => {
            bail!("no candidate: {e}")
        }
    }
}

fn print_summary(report: &ExecutionReport) {
    println!("status: {}", report.status);
    println!(
        "steps:  {}{}",
        report.trace_history.len(),
        if report.truncated { " (truncated)" } else { "" }
    );
    if let Some(last) = report.trace_history.last() {
        println!("last:   line {}", last.location);
    }
    if let Some(log) = &report.error_log {
        println!("\n{log}");
    }
}
