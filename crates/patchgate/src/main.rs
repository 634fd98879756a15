//! patchgate - macOS software update enforcement
//!
//! Run once per schedule tick by the management agent. Wires together:
//! - Invocation parameters and the optional settings file
//! - The deferral record and the audit log
//! - The enforcement controller, driven through the system command runner
//!
//! Exit status is 0 for every completed run, 255 when an external command
//! timed out and 1 for configuration or engine failures.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use patchgate_api::Outcome;
use patchgate_config::{load_policy, Policy};
use patchgate_core::{EngineResult, EnforcementController};
use patchgate_host_api::CommandRunner;
use patchgate_host_macos::SystemRunner;
use patchgate_store::{AuditEvent, AuditLog, DeferralStore, PlistDeferralStore, SqliteAuditLog};
use patchgate_util::{default_config_path, RunId, PATCHGATE_CONFIG_ENV, PATCHGATE_DATA_DIR_ENV};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for configuration and engine failures
const EXIT_FATAL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// patchgate - Enforce pending macOS software updates
#[derive(Parser, Debug)]
#[command(name = "patchgate")]
#[command(about = "Enforce pending macOS software updates", long_about = None)]
struct Args {
    /// DEFER_DAYS QUIET_START QUIET_END MIN_BATTERY, optionally preceded by
    /// the management agent's three reserved arguments
    #[arg(allow_hyphen_values = true)]
    params: Vec<String>,

    /// Settings file (default: /Library/Preferences/com.patchgate.toml)
    #[arg(short, long, env = PATCHGATE_CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Data directory override for the audit database
    #[arg(short, long, env = PATCHGATE_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Don't record the run in the audit log
    #[arg(long)]
    no_audit: bool,
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match args.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load(args: &Args) -> Result<Policy> {
    let (path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };

    let mut policy = load_policy(&args.params, Some(path.as_path()), explicit)
        .with_context(|| format!("Failed to load configuration (settings file {:?})", path))?;

    if let Some(dir) = &args.data_dir {
        policy.settings.paths.data_dir = dir.clone();
    }

    info!(
        defer_limit_days = policy.thresholds.defer_limit_days,
        quiet_hours = %policy.thresholds.quiet_hours,
        min_battery_percent = policy.thresholds.min_battery_percent,
        "Configuration loaded"
    );
    Ok(policy)
}

/// The audit log never blocks enforcement
fn open_audit_log(policy: &Policy) -> Option<Arc<dyn AuditLog>> {
    let data_dir = &policy.settings.paths.data_dir;
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        warn!(dir = %data_dir.display(), error = %e, "Failed to create data directory, audit disabled");
        return None;
    }

    let db_path = data_dir.join("patchgate.db");
    match SqliteAuditLog::open(&db_path) {
        Ok(log) if log.is_healthy() => {
            info!(db_path = %db_path.display(), "Audit log opened");
            Some(Arc::new(log))
        }
        Ok(_) => {
            warn!(db_path = %db_path.display(), "Audit log unusable, audit disabled");
            None
        }
        Err(e) => {
            warn!(db_path = %db_path.display(), error = %e, "Failed to open audit log");
            None
        }
    }
}

fn audit_log_for(args: &Args, policy: &Policy) -> Option<Arc<dyn AuditLog>> {
    if args.no_audit {
        info!("Audit disabled");
        None
    } else {
        open_audit_log(policy)
    }
}

/// Record the run, then hand the result back untouched
fn record_run(
    audit: Option<&dyn AuditLog>,
    run_id: &RunId,
    result: EngineResult<Outcome>,
) -> EngineResult<Outcome> {
    if let Some(audit) = audit {
        let event = match &result {
            Ok(outcome) => AuditEvent::run_completed(run_id.clone(), outcome.clone()),
            Err(e) => AuditEvent::run_failed(run_id.clone(), e.to_string()),
        };
        if let Err(e) = audit.append(event) {
            warn!(run_id = %run_id, error = %e, "Failed to record run in audit log");
        }
    }
    result
}

async fn run(args: &Args) -> Result<Outcome> {
    let policy = load(args)?;
    let audit = audit_log_for(args, &policy);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let deferrals: Arc<dyn DeferralStore> =
        Arc::new(PlistDeferralStore::new(&policy.settings.paths.deferral_file));

    let run_id = RunId::new();
    let controller = EnforcementController::new(&policy, runner, deferrals);
    let result = controller.run(patchgate_util::now()).await;

    let outcome = record_run(audit.as_deref(), &run_id, result).context("Enforcement run failed")?;
    info!(
        run_id = %run_id,
        outcome = outcome.name(),
        decision = ?outcome.decision(),
        exit_code = outcome.exit_code(),
        "Run complete"
    );
    Ok(outcome)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "patchgate starting");

    match run(&args).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!(error = %format!("{:#}", e), "patchgate failed");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
