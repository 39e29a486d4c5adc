//! Scan lifecycle: Idle → Running → Complete | Failed → Running → ...
//!
//! The controller owns the current [`ScanResult`]. All transitions go through
//! the write half of one `RwLock`, so concurrent callers see a single writer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ErrorKind, ScanError};
use crate::filter::{filter_hosts, summarize, HostQuery, HostStats};
use crate::netdetect::TargetRange;
use crate::ports::PortSpec;
use crate::report::parse_report;
use crate::scanner::ScanTool;
use crate::topology::{layout, Topology, Viewport, ViewState};
use crate::types::{now_rfc3339, Health, Host, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Read-only snapshot of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: ScanState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    pub host_count: usize,
}

/// Hosts visible under a query plus their aggregates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub hosts: Vec<Host>,
    pub stats: HostStats,
    pub total_hosts: usize,
}

/// Raw scan parameters as they arrive from a caller.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub range: String,
    pub ports: String,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            range: crate::netdetect::DEFAULT_RANGE.to_string(),
            ports: crate::ports::DEFAULT_PORTS.to_string(),
        }
    }
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(TargetRange, PortSpec), ScanError> {
        Ok((TargetRange::parse(&self.range)?, PortSpec::parse(&self.ports)?))
    }
}

#[derive(Debug)]
struct SessionInner {
    state: ScanState,
    generation: u64,
    current: Option<Arc<ScanResult>>,
    target: Option<TargetRange>,
    ports: Option<PortSpec>,
    started_at: Option<String>,
    failure: Option<Failure>,
    cancel: Option<CancellationToken>,
}

/// Long-lived scan controller shared by every request handler.
#[derive(Clone)]
pub struct ScanSession {
    tool: Arc<dyn ScanTool>,
    inner: Arc<RwLock<SessionInner>>,
}

impl ScanSession {
    pub fn new(tool: Arc<dyn ScanTool>) -> Self {
        Self {
            tool,
            inner: Arc::new(RwLock::new(SessionInner {
                state: ScanState::Idle,
                generation: 0,
                current: None,
                target: None,
                ports: None,
                started_at: None,
                failure: None,
                cancel: None,
            })),
        }
    }

    pub async fn health(&self) -> Health {
        Health {
            status: "ok".into(),
            nmap_available: self.tool.is_available().await,
            timestamp: now_rfc3339(),
        }
    }

    pub async fn state(&self) -> ScanState {
        self.inner.read().await.state
    }

    pub async fn status(&self) -> SessionStatus {
        let s = self.inner.read().await;
        SessionStatus {
            state: s.state,
            range: s.target.map(|t| t.to_string()),
            ports: s.ports.as_ref().map(|p| p.to_string()),
            started_at: s.started_at.clone(),
            error: s.failure.clone(),
            host_count: s.current.as_ref().map_or(0, |r| r.hosts.len()),
        }
    }

    pub async fn current(&self) -> Option<Arc<ScanResult>> {
        self.inner.read().await.current.clone()
    }

    /// Run one scan to completion.
    ///
    /// Validation and tool availability are checked before any state change;
    /// a second request while one is running is rejected with [`ScanError::Busy`].
    pub async fn run_scan(&self, request: &ScanRequest) -> Result<Arc<ScanResult>, ScanError> {
        let (target, ports) = request.validate()?;

        if self.state().await == ScanState::Running {
            return Err(ScanError::Busy);
        }
        if !self.tool.is_available().await {
            return Err(ScanError::ToolUnavailable {
                tool: self.tool.name().to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let generation = {
            let mut s = self.inner.write().await;
            if s.state == ScanState::Running {
                return Err(ScanError::Busy);
            }
            s.generation += 1;
            s.state = ScanState::Running;
            s.current = None;
            s.failure = None;
            s.target = Some(target);
            s.ports = Some(ports.clone());
            s.started_at = Some(now_rfc3339());
            s.cancel = Some(cancel.clone());
            s.generation
        };
        info!(range = %target, ports = %ports, generation, "scan started");

        // Detached so a dropped caller (e.g. a closed HTTP connection) still
        // records the outcome and leaves the session out of `Running`.
        let this = self.clone();
        tokio::spawn(async move { this.execute(generation, target, ports, cancel).await })
            .await
            .map_err(|e| ScanError::ToolExecution(format!("scan task failed: {e}")))?
    }

    async fn execute(
        &self,
        generation: u64,
        target: TargetRange,
        ports: PortSpec,
        cancel: CancellationToken,
    ) -> Result<Arc<ScanResult>, ScanError> {
        let start = Instant::now();
        let outcome = self.tool.run(&target, &ports, cancel).await.map(|output| {
            let hosts = parse_report(&output.stdout);
            Arc::new(ScanResult {
                command: output.command,
                raw_report: String::from_utf8_lossy(&output.stdout).into_owned(),
                hosts,
                scan_duration: start.elapsed().as_secs_f64(),
                timestamp: now_rfc3339(),
                range: target.to_string(),
                ports_scanned: ports.to_string(),
            })
        });

        let mut s = self.inner.write().await;
        if s.generation != generation {
            // stopped; `stop` already recorded the transition
            return outcome;
        }
        s.cancel = None;
        match &outcome {
            Ok(result) => {
                info!(
                    hosts = result.hosts.len(),
                    duration_s = result.scan_duration,
                    "scan complete"
                );
                s.state = ScanState::Complete;
                s.current = Some(result.clone());
            }
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "scan failed");
                s.state = ScanState::Failed;
                s.failure = Some(Failure {
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
        outcome
    }

    /// Stop the running scan: the nmap process is killed and the session fails
    /// with [`ErrorKind::Cancelled`]. Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut s = self.inner.write().await;
        if s.state != ScanState::Running {
            return false;
        }
        if let Some(cancel) = s.cancel.take() {
            cancel.cancel();
        }
        // Invalidate the in-flight completion so it cannot overwrite this transition.
        s.generation += 1;
        s.state = ScanState::Failed;
        s.failure = Some(Failure {
            kind: ErrorKind::Cancelled,
            message: ScanError::Cancelled.to_string(),
        });
        info!("scan stopped");
        true
    }

    /// Filtered hosts and aggregates for the current result.
    pub async fn hosts(&self, query: &HostQuery) -> Option<HostView> {
        let result = self.current().await?;
        let hosts = filter_hosts(&result.hosts, &query.search, query.category);
        Some(HostView {
            stats: summarize(&hosts, result.scan_duration),
            total_hosts: result.hosts.len(),
            hosts,
        })
    }

    /// Layout of the visible hosts. Without a result only the gateway is placed.
    pub async fn topology(
        &self,
        query: &HostQuery,
        viewport: Viewport,
        view: &mut ViewState,
    ) -> Topology {
        let (hosts, gateway) = {
            let s = self.inner.read().await;
            let hosts = s
                .current
                .as_ref()
                .map(|r| filter_hosts(&r.hosts, &query.search, query.category))
                .unwrap_or_default();
            (hosts, s.target.map(|t| t.likely_gateway()))
        };
        let mut topo = layout(&hosts, viewport);
        if let Some(ip) = gateway {
            topo = topo.with_gateway_ip(ip.to_string());
        }
        view.apply_selection(&mut topo);
        topo
    }
}
