//! Process and network utilities for running the server.
//!
//! Port allocation and a small server-info file used for discovery by
//! external tooling (e.g. a `curl`-based smoke test wanting to know which
//! port a `max_port_attempts`-driven search actually landed on).

use std::error::Error;
use std::fs;
use std::net::TcpListener;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::config::BackendConfig;

pub const SERVER_INFO_FILE: &str = "mentatsync_server.json";

#[derive(Serialize, Deserialize)]
pub struct ServerInfo {
    pub pid: u32,
    pub host: String,
    pub port: u16,
}

/// Check whether a TCP port is free to bind on localhost.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Find an available port, starting at the configured port and trying
/// sequential ports up to `max_port_attempts` times.
pub fn find_available_port(config: &BackendConfig) -> Result<u16, Box<dyn Error>> {
    let port = config.port;

    if is_port_available(port) {
        return Ok(port);
    }

    warn!("configured port {} is not available", port);

    for p in (port + 1)..=(port + config.max_port_attempts) {
        if is_port_available(p) {
            trace!("using alternative port: {}", p);
            return Ok(p);
        }
    }

    Err(Box::<dyn Error>::from("could not find an available port"))
}

/// Write a small discovery file recording this process's PID and bind
/// address, so an external supervisor can find a dynamically-chosen port.
pub fn write_server_info(host: &str, port: u16) -> Result<(), Box<dyn Error>> {
    let info = ServerInfo { pid: std::process::id(), host: host.to_string(), port };
    let json = serde_json::to_string_pretty(&info)?;
    fs::write(SERVER_INFO_FILE, json)?;
    Ok(())
}

/// Terminate a previously-running instance recorded in [`SERVER_INFO_FILE`],
/// if its process is still alive. Returns `true` if an instance was found
/// and signalled.
pub fn terminate_previous_instance() -> bool {
    let Ok(info_str) = fs::read_to_string(SERVER_INFO_FILE) else {
        return false;
    };
    let Ok(info) = serde_json::from_str::<ServerInfo>(&info_str) else {
        return false;
    };
    let pid = info.pid.to_string();

    #[cfg(target_family = "unix")]
    {
        let check_result = Command::new("kill").arg("-0").arg(&pid).output();
        match check_result {
            Ok(output) if !output.status.success() => {
                trace!("process {pid} no longer exists, ignoring stale server info file");
                return false;
            }
            Err(e) => {
                error!("error checking process: {e}");
                return false;
            }
            _ => {}
        }

        match Command::new("kill").arg("-15").arg(&pid).output() {
            Ok(output) if output.status.success() => {
                std::thread::sleep(Duration::from_millis(500));
                return true;
            }
            Ok(output) => {
                error!("failed to terminate process: {}", String::from_utf8_lossy(&output.stderr));
            }
            Err(e) => error!("error terminating process: {e}"),
        }
    }

    #[cfg(target_family = "windows")]
    {
        let check_result = Command::new("tasklist").args(&["/FI", &format!("PID eq {}", pid)]).output();
        match check_result {
            Ok(output) => {
                let output_str = String::from_utf8_lossy(&output.stdout);
                if !output_str.contains(&pid) {
                    trace!("process {pid} no longer exists, ignoring stale server info file");
                    return false;
                }
            }
            Err(e) => {
                error!("error checking process: {}", e);
                return false;
            }
        }

        match Command::new("taskkill").args(&["/PID", &pid, "/F"]).output() {
            Ok(output) if output.status.success() => {
                std::thread::sleep(Duration::from_millis(500));
                return true;
            }
            Ok(output) => {
                error!("failed to terminate process: {}", String::from_utf8_lossy(&output.stderr));
            }
            Err(e) => error!("error terminating process: {}", e),
        }
    }

    false
}
