use std::io;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::ScanError;
use crate::types::now_rfc3339;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing one host. An unreachable host is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PingOutcome {
    #[serde(rename_all = "camelCase")]
    Reachable {
        ip: String,
        latency_ms: f64,
        timestamp: String,
        raw_output: String,
    },
    Unreachable { ip: String, timestamp: String },
}

fn ping_args(ip: Ipv4Addr) -> Vec<String> {
    if cfg!(windows) {
        vec!["-n".into(), "1".into(), "-w".into(), "3000".into(), ip.to_string()]
    } else {
        vec!["-c".into(), "1".into(), "-W".into(), "3".into(), ip.to_string()]
    }
}

/// Round-trip time reported by `ping`, e.g. `time=0.045 ms` or `time<1ms`.
pub fn extract_latency_ms(output: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)time[<=]\s*(\d+(?:\.\d+)?)\s*ms").expect("latency pattern is valid")
    });
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// Send one echo request to `ip` with the platform `ping` utility.
pub async fn ping_host(ip: &str) -> Result<PingOutcome, ScanError> {
    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| ScanError::validation("IP address", format!("'{ip}' is not an IPv4 address")))?;

    let start = Instant::now();
    let output = Command::new("ping")
        .args(ping_args(addr))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match time::timeout(PING_TIMEOUT, output).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::ToolUnavailable { tool: "ping".into() })
        }
        Ok(Err(e)) => return Err(ScanError::ToolExecution(format!("failed to run ping: {e}"))),
        Err(_) => {
            debug!(%addr, "ping timed out");
            return Ok(PingOutcome::Unreachable {
                ip: addr.to_string(),
                timestamp: now_rfc3339(),
            });
        }
    };

    if !output.status.success() {
        debug!(%addr, status = %output.status, "host unreachable");
        return Ok(PingOutcome::Unreachable {
            ip: addr.to_string(),
            timestamp: now_rfc3339(),
        });
    }

    let raw_output = String::from_utf8_lossy(&output.stdout).to_string();
    let latency_ms = extract_latency_ms(&raw_output)
        .unwrap_or_else(|| start.elapsed().as_secs_f64() * 1000.0);
    Ok(PingOutcome::Reachable {
        ip: addr.to_string(),
        latency_ms,
        timestamp: now_rfc3339(),
        raw_output,
    })
}
