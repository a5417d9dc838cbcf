//! MentatSync server entrypoint.
//!
//! ```bash
//! mentatsync --config config.yaml
//! mentatsync --database-url sqlite://mentatsync.db --bind 127.0.0.1:3000
//! mentatsync --duration 60   # for scripted tests
//! ```
//!
//! Graceful shutdown is handled inside `server::run_server_with_duration`
//! via `tokio::select!` against `ctrl_c()`; this function just builds the
//! runtime, storage, and router, then hands off.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mentatsync::app_state::AppState;
use mentatsync::logging::init_logging;
use mentatsync::storage::SqliteStorage;
use mentatsync::{config, server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a config.yaml file (default: search upward from the executable)
    #[arg(long)]
    config: Option<String>,

    /// Override the database.url config value
    #[arg(long)]
    database_url: Option<String>,

    /// Override the backend.bind_addr config value
    #[arg(long)]
    bind: Option<String>,

    /// Run for a specific duration in seconds, then exit (for scripted tests)
    #[arg(long)]
    duration: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("failed to create runtime: {e}")))?;

    let result = runtime.block_on(async_main());
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    result
}

async fn async_main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();
    init_logging();

    let start_time = std::time::Instant::now();

    let mut cfg = if let Some(path) = &args.config {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("failed to read {path}: {e}")))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("failed to parse {path}: {e}")))?
    } else {
        config::load_config()
    };

    if let Some(url) = args.database_url {
        cfg.database.url = url;
    }
    if let Some(bind) = args.bind {
        cfg.backend.bind_addr = bind;
    }

    let db_path = cfg
        .database
        .url
        .strip_prefix("sqlite://")
        .unwrap_or(&cfg.database.url)
        .to_string();
    let storage = SqliteStorage::open(&db_path, cfg.database.max_connections).await?;

    info!("MentatSync initialized, database at {}", db_path);

    let app_state = Arc::new(AppState::new(Arc::new(storage), cfg));

    server::run_server_with_duration(app_state, args.duration).await?;

    info!("total runtime: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
