use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lan_map_rs::filter::{filter_hosts, summarize, Category};
use lan_map_rs::netdetect::{self, DEFAULT_RANGE};
use lan_map_rs::ports::DEFAULT_PORTS;
use lan_map_rs::scanner::{NmapConfig, NmapTool, DEFAULT_MAX_OUTPUT};
use lan_map_rs::server;
use lan_map_rs::session::{ScanRequest, ScanSession};
use lan_map_rs::types::{ExportDocument, Host, ScanResult};

/// lan-map-rs: LAN discovery dashboard backend driving nmap.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-map-rs",
    version,
    about = "LAN discovery dashboard backend: runs nmap, normalizes its report and serves hosts and topology.",
    long_about = None
)]
struct Cli {
    /// Target range: CIDR (192.168.1.0/24), dash range (192.168.1.1-254) or single IP.
    #[arg(long, default_value = DEFAULT_RANGE)]
    range: String,

    /// Use the first detected local /24 instead of --range.
    #[arg(long = "auto-range", default_value_t = false)]
    auto_range: bool,

    /// Ports passed to nmap -p (e.g. 1-1024 or 80,443,8080).
    #[arg(long, default_value = DEFAULT_PORTS)]
    ports: String,

    /// nmap executable.
    #[arg(long, default_value = "nmap")]
    nmap: PathBuf,

    /// Extra nmap argument, repeatable. Replaces the default `-T4 -sS`.
    #[arg(long = "nmap-arg", allow_hyphen_values = true)]
    nmap_args: Vec<String>,

    /// Upper bound for one nmap run, in seconds.
    #[arg(long = "timeout-secs", default_value_t = 300)]
    timeout_secs: u64,

    /// Largest nmap report accepted, in bytes.
    #[arg(long = "max-output-bytes", default_value_t = DEFAULT_MAX_OUTPUT)]
    max_output_bytes: usize,

    /// Start the HTTP API and dashboard instead of running a single scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Address for the HTTP server.
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind: String,

    /// Directory with the static dashboard files.
    #[arg(long = "ui-dir", default_value = "ui")]
    ui_dir: PathBuf,

    /// Only print hosts matching this text (ip, hostname or vendor).
    #[arg(long, default_value = "")]
    search: String,

    /// Only print hosts of this category: all, web or named.
    #[arg(long, default_value = "all")]
    category: Category,

    /// Write the scan result as pretty JSON export to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = NmapConfig {
        program: cli.nmap.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        max_output: cli.max_output_bytes,
        ..NmapConfig::default()
    };
    if !cli.nmap_args.is_empty() {
        config.extra_args = cli.nmap_args.clone();
    }

    let range = if cli.auto_range {
        detect_range().unwrap_or_else(|| cli.range.clone())
    } else {
        cli.range.clone()
    };

    println!("lan-map-rs configuration:");
    println!("  range        : {}", range);
    println!("  ports        : {}", cli.ports);
    println!("  nmap         : {} {}", config.program.display(), config.extra_args.join(" "));
    println!("  timeout_secs : {}", cli.timeout_secs);
    println!("  serve_ui     : {}", cli.serve_ui);

    let session = ScanSession::new(Arc::new(NmapTool::new(config)));

    let health = session.health().await;
    if !health.nmap_available {
        warn!("nmap is not available; install it (https://nmap.org/download.html) to run scans");
    }

    if cli.serve_ui {
        println!("Dashboard at http://{} (Ctrl+C to stop)", cli.bind);
        tokio::select! {
            res = server::spawn_server(&cli.bind, &cli.ui_dir, session.clone()) => res?,
            _ = tokio::signal::ctrl_c() => {
                if session.stop().await {
                    info!("stopped running scan on shutdown");
                }
            }
        }
        return Ok(());
    }

    let request = ScanRequest {
        range,
        ports: cli.ports.clone(),
    };
    let result = tokio::select! {
        res = session.run_scan(&request) => res?,
        _ = tokio::signal::ctrl_c() => {
            session.stop().await;
            anyhow::bail!("scan interrupted");
        }
    };

    let visible = filter_hosts(&result.hosts, &cli.search, cli.category);
    print_hosts_table(&visible, &result);

    if let Some(path) = cli.output.as_deref() {
        match write_export_json(path, &result) {
            Ok(()) => println!("Wrote JSON results to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {:#}", path.display(), e),
        }
    }

    Ok(())
}

fn detect_range() -> Option<String> {
    match netdetect::detect_local_cidrs() {
        Ok(cidrs) => {
            for cidr in &cidrs {
                info!(%cidr, "detected local network");
            }
            cidrs.first().map(|c| c.to_string())
        }
        Err(e) => {
            warn!(error = %e, "failed to detect local networks");
            None
        }
    }
}

fn print_hosts_table(hosts: &[Host], result: &ScanResult) {
    let stats = summarize(hosts, result.scan_duration);
    let mut ip_w = "ip".len();
    let mut name_w = "hostname".len();
    for h in hosts {
        ip_w = ip_w.max(h.ip.len());
        name_w = name_w.max(h.hostname.as_deref().map_or(0, |n| n.chars().count()).min(30));
    }

    println!(
        "\nHosts: {} (of {})  open ports: {}  web: {}  duration: {:.2}s",
        stats.hosts,
        result.hosts.len(),
        stats.open_ports,
        stats.web_hosts,
        stats.scan_duration
    );
    println!("{:<ip_w$}  {:<name_w$}  {}", "ip", "hostname", "ports");
    println!("{:-<ip_w$}  {:-<name_w$}  {:-<5}", "", "", "");
    for h in hosts {
        let name: String = h.hostname.as_deref().unwrap_or_default().chars().take(30).collect();
        let ports = h
            .ports
            .iter()
            .map(|p| format!("{}/{}", p.port, p.service))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<ip_w$}  {:<name_w$}  {}", h.ip, name, ports);
    }
}

fn write_export_json(path: &Path, result: &ScanResult) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &ExportDocument::new(result))?;
    Ok(())
}
