use std::io::{self, BufRead};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use signin_attendance::report::{write_sessions_file, write_summary_file, SessionFilter};
use signin_attendance::view::NullView;
use signin_attendance::{AttendanceError, AttendanceManager, SqliteStorage, Storage};
use signin_core::config::SigninConfig;
use signin_scheduler::{Clock, SystemClock};
use tracing::{error, info, warn};

mod console;
mod reload;

#[derive(Parser)]
#[command(name = "signin-kiosk", version, about = "Badge scan sign-in kiosk")]
struct Cli {
    /// Config file (default: $SIGNIN_CONFIG, then ~/.signin/signin.toml)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read badge scans from stdin, one per line (default)
    Run,
    /// Write a CSV report and exit
    Report {
        /// Output path (default: report.path, or report.sessions_path with --sessions)
        #[arg(long)]
        out: Option<String>,
        /// One row per completed session instead of per-person totals
        #[arg(long)]
        sessions: bool,
        /// Only this person's sessions ("Last, First" or "First Last")
        #[arg(long, requires = "sessions")]
        name: Option<String>,
        /// Only sessions starting on or after this day (YYYY-MM-DD)
        #[arg(long, requires = "sessions")]
        from: Option<NaiveDate>,
        /// Only sessions starting on or before this day (YYYY-MM-DD)
        #[arg(long, requires = "sessions")]
        to: Option<NaiveDate>,
    },
    /// Drop scans dated before a day (YYYY-MM-DD) and exit
    Prune {
        #[arg(long)]
        before: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signin_kiosk=info,signin_attendance=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > SIGNIN_CONFIG env > ~/.signin/signin.toml
    let config_path = cli.config.or_else(|| std::env::var("SIGNIN_CONFIG").ok());
    let config = SigninConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SigninConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    let storage = Arc::new(SqliteStorage::open(db_path)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = config.attendance.settings(clock.now().date());

    match cli.command.unwrap_or(Command::Run) {
        Command::Report {
            out,
            sessions: false,
            ..
        } => {
            let path = out.unwrap_or_else(|| config.report.path.clone());
            let records = storage.load()?;
            write_summary_file(&records, settings.count_since, clock.now(), &path)?;
            info!(%path, records = records.len(), "report written");
            Ok(())
        }
        Command::Report {
            out,
            sessions: true,
            name,
            from,
            to,
        } => {
            let path = out.unwrap_or_else(|| config.report.sessions_path.clone());
            let filter = SessionFilter::new(name.as_deref(), from, to);
            let records = storage.load()?;
            let rows = write_sessions_file(&records, &filter, &path)?;
            info!(%path, rows, "session export written");
            Ok(())
        }
        Command::Prune { before } => {
            let manager = AttendanceManager::new(storage, Arc::new(NullView), clock, settings)?;
            let removed = manager.prune(before);
            manager.commit()?;
            info!(removed, %before, "prune committed");
            Ok(())
        }
        Command::Run => run(storage, clock, config, config_path).await,
    }
}

async fn run(
    storage: Arc<SqliteStorage>,
    clock: Arc<dyn Clock>,
    config: SigninConfig,
    config_path: Option<String>,
) -> anyhow::Result<()> {
    let settings = config.attendance.settings(clock.now().date());
    let manager = Arc::new(
        AttendanceManager::new(storage, Arc::new(console::ConsoleView), clock.clone(), settings)?
            .with_confirmation(Arc::new(|| {
                console::ask_yes_no("Sign everyone out now?", io::stdin().lock())
            })),
    );
    manager.start_clock();
    info!("ready for scans");

    // Stdin is read on a plain thread: the confirmation prompt reads from it
    // too, and both must happen on the same thread in order.
    let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
    let reader = Arc::clone(&manager);
    std::thread::spawn(move || {
        let _ = done_tx.send(read_scans(&reader));
    });

    let mut reload = reload::ReloadSignal::install();
    let mut fatal = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            result = &mut done_rx => {
                match result {
                    Ok(Err(e)) => fatal = Some(e),
                    _ => info!("scan source closed"),
                }
                break;
            }
            _ = reload.recv() => {
                info!("reload requested");
                reload::reload_settings(&manager, config_path.as_deref(), clock.now().date());
            }
        }
    }

    manager.shutdown().await;
    if let Err(e) = manager.commit() {
        error!(error = %e, "final commit failed");
    }
    let report_path = &config.report.path;
    ensure_parent_dir(report_path);
    match std::fs::File::create(report_path) {
        Ok(file) => match manager.write_report(file) {
            Ok(()) => info!(path = %report_path, "report written"),
            Err(e) => warn!(error = %e, "report failed"),
        },
        Err(e) => warn!(error = %e, path = %report_path, "cannot create report"),
    }

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Feed stdin lines to the manager until EOF.
///
/// Persistence failures are logged and scanning continues; a missing
/// confirmation source is a setup bug and ends the loop.
fn read_scans(manager: &AttendanceManager) -> Result<(), AttendanceError> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        // Lock per read so the confirmation prompt can take stdin in between.
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        match manager.handle_scan_data(&line) {
            Ok(()) => {}
            Err(AttendanceError::MissingConfirmation) => {
                return Err(AttendanceError::MissingConfirmation)
            }
            Err(e) => error!(error = %e, "scan not saved; will retry on next commit"),
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
