//! lacplab - LACP scenario suite runner.
//!
//! Loads scenario YAML files from a directory, runs them against the
//! lab devices over the TCP transport, prints a summary, and exits
//! non-zero unless every scenario passed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lacplab_orch::{
    discover_scenarios, AuditSink, JsonlSink, MemorySink, ScenarioReport, SuiteConfig, SuiteRunner,
};
use lacplab_session::{SessionConfig, TcpTransport, Transport};

/// LACP topology scenario runner
#[derive(Parser, Debug)]
#[command(name = "lacplab")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing scenario YAML files
    #[arg(short = 's', long, default_value = "scenarios")]
    scenarios: PathBuf,

    /// Scenarios to run in parallel
    #[arg(short = 'j', long, default_value = "4")]
    parallelism: usize,

    /// Per-scenario deadline in seconds (cleanup runs outside it)
    #[arg(short = 't', long, default_value = "30")]
    timeout_secs: u64,

    /// Session connect timeout, seconds
    #[arg(long, default_value = "5")]
    connect_timeout_secs: u64,

    /// Command round-trip timeout, seconds
    #[arg(long, default_value = "10")]
    command_timeout_secs: u64,

    /// Append audit records (JSON lines) to this file
    #[arg(short = 'a', long)]
    audit_log: Option<PathBuf>,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Initializes tracing/logging subsystem
fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn print_summary(reports: &[ScenarioReport]) {
    println!();
    println!("==== lacp-lab suite ====");
    for report in reports {
        let duration = format!("{} ms", report.duration_ms);
        println!(
            "  {:<40} {:<10} {:>10}",
            report.name,
            report.outcome.to_string(),
            duration
        );
        if let Some(error) = &report.error {
            println!("      {error}");
        }
        for v in report.verifications.iter().filter(|v| !v.is_passed()) {
            println!(
                "      {}: {}",
                v.invariant,
                v.detail.as_deref().unwrap_or("did not hold")
            );
        }
    }
    let passed = reports.iter().filter(|r| r.outcome.is_passed()).count();
    println!(
        "total {}, passed {}, failed {}",
        reports.len(),
        passed,
        reports.len() - passed
    );
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let files = discover_scenarios(&args.scenarios).with_context(|| {
        format!(
            "failed to read scenario directory '{}'",
            args.scenarios.display()
        )
    })?;
    if files.is_empty() {
        warn!(dir = %args.scenarios.display(), "no scenario files found");
        return Ok(true);
    }
    info!(count = files.len(), "scenarios discovered");

    let sink: Arc<dyn AuditSink> = match &args.audit_log {
        Some(path) => Arc::new(
            JsonlSink::open(path)
                .with_context(|| format!("failed to open audit log '{}'", path.display()))?,
        ),
        None => Arc::new(MemorySink::new()),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing current steps and cleaning up");
                cancel.cancel();
            }
        });
    }

    let session_config = SessionConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        command_timeout: Duration::from_secs(args.command_timeout_secs),
    };
    let suite_config = SuiteConfig {
        parallelism: args.parallelism,
        scenario_timeout: Duration::from_secs(args.timeout_secs),
    };

    let runner = Arc::new(SuiteRunner::new(
        Arc::new(TcpTransport::new()) as Arc<dyn Transport>,
        session_config,
        suite_config,
        sink,
        cancel,
    ));

    let report = runner.run_suite(files).await;
    print_summary(&report.reports);
    Ok(report.all_passed())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting lacplab ---");
    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
