use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scribeline_lib::auth::AuthSession;
use scribeline_lib::config::ClientConfig;
use scribeline_lib::sync::{SyncContext, SyncHub};

const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("scribeline watch failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let _ = dotenvy::dotenv();
    scribeline_lib::init_tracing();

    let mut config_path: Option<PathBuf> = None;
    let mut project_id: Option<String> = None;
    let mut report_interval = DEFAULT_REPORT_INTERVAL;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }

        if let Some(value) = arg.strip_prefix("--config=") {
            config_path = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| "--config requires a value".to_string())?;
            config_path = Some(PathBuf::from(value));
            continue;
        }

        if let Some(value) = arg.strip_prefix("--project=") {
            project_id = Some(value.to_string());
            continue;
        }
        if arg == "--project" {
            let value = args
                .next()
                .ok_or_else(|| "--project requires a value".to_string())?;
            project_id = Some(value);
            continue;
        }

        if let Some(value) = arg.strip_prefix("--report-secs=") {
            report_interval = parse_report_interval(value)?;
            continue;
        }
        if arg == "--report-secs" {
            let value = args
                .next()
                .ok_or_else(|| "--report-secs requires a value".to_string())?;
            report_interval = parse_report_interval(&value)?;
            continue;
        }

        return Err(format!("unknown argument '{arg}'. Use --help for usage"));
    }

    let config = match &config_path {
        Some(path) => ClientConfig::load(path),
        None => ClientConfig::from_env(),
    }
    .map_err(|error| error.to_string())?;
    tracing::info!(config = ?config.to_view(), "configuration loaded");

    let token = std::env::var("SCRIBELINE_ACCESS_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());
    if token.is_none() {
        tracing::warn!("SCRIBELINE_ACCESS_TOKEN is not set; event streams will not connect");
    }
    let session = Arc::new(AuthSession::new(token));

    let ctx = SyncContext::new(config, session.clone()).map_err(|error| error.to_string())?;
    let hub = SyncHub::new(ctx);

    let projects = hub.start_projects().await;
    let files = match &project_id {
        Some(id) => Some(hub.files_for(id).await),
        None => None,
    };

    let mut expired = session.watch_expired();
    let mut ticker = tokio::time::interval(report_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received; shutting down");
                break;
            }
            changed = expired.changed() => {
                if changed.is_err() {
                    break;
                }
                if *expired.borrow_and_update() {
                    tracing::warn!("session expired; set a fresh SCRIBELINE_ACCESS_TOKEN and restart");
                }
            }
            _ = ticker.tick() => {
                let store = projects.store();
                tracing::info!(
                    state = %projects.connection_state(),
                    projects = store.len(),
                    processing = store.processing_count(),
                    polling = projects.is_polling(),
                    "projects"
                );
                if let Some(files) = &files {
                    let store = files.store();
                    tracing::info!(
                        project_id = files.project_id(),
                        state = %files.connection_state(),
                        files = store.len(),
                        processing = store.processing_count(),
                        polling = files.is_polling(),
                        "files"
                    );
                }
            }
        }
    }

    hub.shutdown().await;
    Ok(())
}

fn parse_report_interval(value: &str) -> Result<Duration, String> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid --report-secs value '{value}'"))?;
    if secs == 0 {
        return Err("--report-secs must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}

fn print_help() {
    println!(
        "scribeline_watch\n\n\
         Keeps project (and optionally file) state live and logs it until Ctrl-C.\n\n\
         Usage:\n  scribeline_watch [--config <path>] [--project <id>] [--report-secs <n>]\n\n\
         Environment:\n  \
         SCRIBELINE_ACCESS_TOKEN   bearer token for REST and event streams\n  \
         SCRIBELINE_API_BASE_URL   backend base URL\n  \
         SCRIBELINE_API_KEY        value sent as X-API-Key\n  \
         SCRIBELINE_STREAM_ENABLED set to 0/false to rely on polling only\n  \
         SCRIBELINE_POLL_INTERVAL_MS poll interval while files are processing\n  \
         RUST_LOG                  log filter"
    );
}
