use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::netdetect::TargetRange;
use crate::ports::PortSpec;

/// Upper bound for a single nmap run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Largest report accepted on stdout.
pub const DEFAULT_MAX_OUTPUT: usize = 10 * 1024 * 1024;

/// What one finished scanner invocation produced.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command: String,
    pub stdout: Vec<u8>,
}

/// The external scanner as seen by the session controller.
#[async_trait]
pub trait ScanTool: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap probe, e.g. a version query.
    async fn is_available(&self) -> bool;

    /// Run one scan to completion. The full report is returned only after the process exits.
    async fn run(
        &self,
        target: &TargetRange,
        ports: &PortSpec,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ScanError>;
}

#[derive(Debug, Clone)]
pub struct NmapConfig {
    pub program: PathBuf,
    /// Arguments placed between the port selection and the XML output flag.
    pub extra_args: Vec<String>,
    pub timeout: Duration,
    pub max_output: usize,
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("nmap"),
            extra_args: vec!["-T4".into(), "-sS".into()],
            timeout: DEFAULT_TIMEOUT,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }
}

/// Runs the `nmap` binary with `-oX -` and captures its XML report.
#[derive(Debug, Clone, Default)]
pub struct NmapTool {
    config: NmapConfig,
}

impl NmapTool {
    pub fn new(config: NmapConfig) -> Self {
        Self { config }
    }

    /// Argument vector for one scan; never passed through a shell.
    pub fn args(&self, target: &TargetRange, ports: &PortSpec) -> Vec<String> {
        let mut args = vec!["-p".to_string(), ports.to_string()];
        args.extend(self.config.extra_args.iter().cloned());
        args.extend(["-oX".to_string(), "-".to_string(), target.to_string()]);
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut s = self.config.program.display().to_string();
        for a in args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }

    fn spawn_error(&self, e: io::Error) -> ScanError {
        if e.kind() == io::ErrorKind::NotFound {
            ScanError::ToolUnavailable {
                tool: self.config.program.display().to_string(),
            }
        } else {
            ScanError::ToolExecution(format!("failed to start nmap: {e}"))
        }
    }
}

#[async_trait]
impl ScanTool for NmapTool {
    fn name(&self) -> &str {
        "nmap"
    }

    async fn is_available(&self) -> bool {
        let probe = Command::new(&self.config.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match time::timeout(Duration::from_secs(10), probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(error = %e, "nmap version probe failed");
                false
            }
            Err(_) => false,
        }
    }

    async fn run(
        &self,
        target: &TargetRange,
        ports: &PortSpec,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ScanError> {
        let args = self.args(target, ports);
        let command = self.command_line(&args);
        info!(%command, addresses = target.address_count(), "starting nmap");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::ToolExecution("nmap stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ScanError::ToolExecution("nmap stderr unavailable".into()))?;
        let limit = self.config.max_output;

        let work = async {
            let (out, err) = tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit));
            let status = child.wait().await;
            (out, err, status)
        };

        let finished = tokio::select! {
            res = time::timeout(self.config.timeout, work) => res.map_err(|_| ScanError::Timeout(self.config.timeout)),
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
        };
        let (out, err, status) = match finished {
            Ok(parts) => parts,
            Err(e) => {
                match e {
                    ScanError::Cancelled => info!("scan stopped, killing nmap"),
                    _ => warn!(timeout_s = self.config.timeout.as_secs(), "nmap timed out, killing it"),
                }
                let _ = child.kill().await;
                return Err(e);
            }
        };

        let stdout = out.map_err(|e| ScanError::ToolExecution(format!("reading nmap output: {e}")))?;
        let stderr = err
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default();
        let status = status.map_err(|e| ScanError::ToolExecution(format!("waiting for nmap: {e}")))?;

        if stdout.len() > limit {
            return Err(ScanError::OutputTooLarge { limit });
        }
        if !status.success() {
            let message = if stderr.is_empty() {
                format!("nmap exited with {status}")
            } else {
                stderr
            };
            return Err(ScanError::ToolExecution(message));
        }
        if !stderr.is_empty() && !stderr.contains("Warning") {
            warn!(%stderr, "nmap wrote to stderr");
        }

        debug!(bytes = stdout.len(), "nmap finished");
        Ok(ToolOutput { command, stdout })
    }
}

/// Read a stream to its end, keeping at most `limit + 1` bytes so overflow is detectable.
///
/// The remainder is drained so the child never blocks on a full pipe.
pub async fn read_capped<R>(mut reader: R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut reader).take(limit as u64 + 1).read_to_end(&mut buf).await?;
    if buf.len() > limit {
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    }
    Ok(buf)
}
