use serde::{Deserialize, Serialize};
use time::{format_description::well_known, OffsetDateTime};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    #[default]
    Up,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    #[default]
    Open,
}

/// One open TCP service on a host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub port: u16,
    pub service: String,
    pub state: PortState,
}

impl PortInfo {
    pub fn open(port: u16, service: impl Into<String>) -> Self {
        Self {
            port,
            service: service.into(),
            state: PortState::Open,
        }
    }
}

/// A discovered network endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub ports: Vec<PortInfo>,
    pub status: HostStatus,
}

impl Host {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostname: None,
            mac: None,
            vendor: None,
            ports: Vec::new(),
            status: HostStatus::Up,
        }
    }

    pub fn named_hostname(&self) -> Option<&str> {
        self.hostname.as_deref().filter(|h| !h.is_empty())
    }
}

/// One completed scan. Shared behind an `Arc` and never mutated after construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub command: String,
    pub raw_report: String,
    #[serde(rename = "parsedResults")]
    pub hosts: Vec<Host>,
    /// Elapsed wall-clock seconds.
    pub scan_duration: f64,
    pub timestamp: String,
    pub range: String,
    pub ports_scanned: String,
}

/// Downloadable snapshot of a result.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    #[serde(flatten)]
    pub result: &'a ScanResult,
    pub exported_at: String,
    #[serde(skip)]
    exported: OffsetDateTime,
}

impl<'a> ExportDocument<'a> {
    pub fn new(result: &'a ScanResult) -> Self {
        Self::at(result, OffsetDateTime::now_utc())
    }

    pub fn at(result: &'a ScanResult, exported: OffsetDateTime) -> Self {
        Self {
            result,
            exported_at: rfc3339(exported),
            exported,
        }
    }

    /// Suggested download name, e.g. `nmap-scan-1700000000000.json`.
    pub fn file_name(&self) -> String {
        let millis = self.exported.unix_timestamp_nanos() / 1_000_000;
        format!("nmap-scan-{millis}.json")
    }
}

/// Availability of the external scanner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    pub nmap_available: bool,
    pub timestamp: String,
}

pub(crate) fn now_rfc3339() -> String {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
