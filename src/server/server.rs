//! HTTP listener setup: port binding and axum server startup.
//!
//! Signal handling and graceful shutdown live here rather than in
//! `main.rs`, mirroring the teacher's split between runtime bootstrap
//! (`main.rs`) and listener lifecycle (this module).

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::app_state::AppState;
use crate::server::http_api::create_router;
use crate::utils::{find_available_port, terminate_previous_instance, write_server_info, SERVER_INFO_FILE};

/// Run the server until `duration` elapses (if given) or Ctrl-C is
/// received, whichever comes first.
pub async fn run_server_with_duration(
    app_state: Arc<AppState>,
    duration: Option<u64>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let start_time = Instant::now();

    if std::fs::metadata(SERVER_INFO_FILE).is_ok() {
        terminate_previous_instance();
        let _ = std::fs::remove_file(SERVER_INFO_FILE);
    }

    let app = create_router(app_state.clone());
    let port = find_available_port(&app_state.config.backend)
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(e.to_string()))?;
    let addr: SocketAddr = format!("{}:{}", app_state.config.backend.bind_addr, port)
        .parse()
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("invalid bind address: {e}")))?;

    write_server_info(&app_state.config.backend.bind_addr, port)
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(e.to_string()))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Box::<dyn Error + Send + Sync>::from(format!("listener error: {e}")))?;

    info!("MentatSync listening on {}", addr);

    if let Some(duration) = duration {
        tokio::select! {
            result = axum::serve(listener, app) => {
                if let Err(e) = result {
                    error!("server error: {}", e);
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(duration)) => {
                info!("duration limit reached, shutting down");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, shutting down");
            }
        }
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                if let Err(e) = result {
                    error!("server error: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, shutting down");
            }
        }
    }

    let _ = std::fs::remove_file(SERVER_INFO_FILE);
    info!("server completed after {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
