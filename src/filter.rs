use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::ports::is_web_filter_port;
use crate::types::Host;

/// Category filter offered next to the search box.
///
/// Parsing is shared by the CLI and query strings: case-insensitive, empty means `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Category {
    #[default]
    All,
    /// Hosts exposing 80, 443, 8080 or 8443.
    Web,
    /// Hosts with a resolved hostname.
    Named,
}

impl FromStr for Category {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "web" => Ok(Self::Web),
            "named" | "devices" => Ok(Self::Named),
            other => Err(ScanError::validation("category", format!("unknown category '{other}'"))),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = ScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Search text and category, as entered in the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Category,
}

impl HostQuery {
    pub fn new(search: impl Into<String>, category: Category) -> Self {
        Self {
            search: search.into(),
            category,
        }
    }

    pub fn matches(&self, host: &Host) -> bool {
        matches_search(host, &self.search.to_lowercase()) && matches_category(host, self.category)
    }
}

/// Aggregates shown above the host list, always derived from the filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStats {
    pub hosts: usize,
    pub open_ports: usize,
    pub web_hosts: usize,
    pub scan_duration: f64,
}

pub fn exposes_web(host: &Host) -> bool {
    host.ports.iter().any(|p| is_web_filter_port(p.port))
}

fn matches_search(host: &Host, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |field: &str| field.to_lowercase().contains(needle);
    hit(&host.ip)
        || host.hostname.as_deref().is_some_and(hit)
        || host.vendor.as_deref().is_some_and(hit)
}

fn matches_category(host: &Host, category: Category) -> bool {
    match category {
        Category::All => true,
        Category::Web => exposes_web(host),
        Category::Named => host.named_hostname().is_some(),
    }
}

/// Hosts matching both the case-insensitive search term and the category, in input order.
pub fn filter_hosts(hosts: &[Host], search: &str, category: Category) -> Vec<Host> {
    let needle = search.to_lowercase();
    hosts
        .iter()
        .filter(|h| matches_search(h, &needle) && matches_category(h, category))
        .cloned()
        .collect()
}

pub fn summarize(hosts: &[Host], scan_duration: f64) -> HostStats {
    HostStats {
        hosts: hosts.len(),
        open_ports: hosts.iter().map(|h| h.ports.len()).sum(),
        web_hosts: hosts.iter().filter(|h| exposes_web(h)).count(),
        scan_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortInfo;

    fn host(ip: &str, hostname: Option<&str>, vendor: Option<&str>, ports: &[u16]) -> Host {
        Host {
            hostname: hostname.map(str::to_string),
            vendor: vendor.map(str::to_string),
            ports: ports.iter().map(|p| PortInfo::open(*p, "svc")).collect(),
            ..Host::new(ip)
        }
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let hosts = vec![
            host("10.0.0.1", Some("NAS-Box"), None, &[]),
            host("10.0.0.2", None, Some("Raspberry Pi Trading"), &[]),
            host("192.168.0.3", None, None, &[]),
        ];
        let ips = |v: Vec<Host>| v.into_iter().map(|h| h.ip).collect::<Vec<_>>();
        assert_eq!(ips(filter_hosts(&hosts, "nas", Category::All)), ["10.0.0.1"]);
        assert_eq!(ips(filter_hosts(&hosts, "RASPBERRY", Category::All)), ["10.0.0.2"]);
        assert_eq!(ips(filter_hosts(&hosts, "10.0", Category::All)), ["10.0.0.1", "10.0.0.2"]);
        assert_eq!(filter_hosts(&hosts, "", Category::All).len(), 3);
    }

    #[test]
    fn category_rules() {
        let hosts = vec![
            host("10.0.0.1", Some(""), None, &[8443]),
            host("10.0.0.2", Some("tv"), None, &[3000]),
        ];
        assert_eq!(filter_hosts(&hosts, "", Category::Web)[0].ip, "10.0.0.1");
        assert_eq!(filter_hosts(&hosts, "", Category::Web).len(), 1);
        assert_eq!(filter_hosts(&hosts, "", Category::Named)[0].ip, "10.0.0.2");
        assert_eq!(filter_hosts(&hosts, "", Category::Named).len(), 1);
    }

    #[test]
    fn stats_follow_filtered_set() {
        let hosts = vec![
            host("10.0.0.1", None, None, &[22, 80]),
            host("10.0.0.2", None, None, &[443]),
            host("10.0.0.3", None, None, &[]),
        ];
        let stats = summarize(&hosts, 4.25);
        assert_eq!(stats.hosts, 3);
        assert_eq!(stats.open_ports, 3);
        assert_eq!(stats.web_hosts, 2);
        assert_eq!(stats.scan_duration, 4.25);
    }

    #[test]
    fn category_from_str_accepts_devices_alias() {
        assert_eq!("devices".parse::<Category>().unwrap(), Category::Named);
        assert_eq!("WEB".parse::<Category>().unwrap(), Category::Web);
        assert!("printers".parse::<Category>().is_err());
    }

    #[test]
    fn query_deserializes_category_like_the_cli() {
        let q: HostQuery = serde_json::from_str(r#"{"category":"WEB"}"#).unwrap();
        assert_eq!(q.category, Category::Web);
        let q: HostQuery = serde_json::from_str(r#"{"category":""}"#).unwrap();
        assert_eq!(q.category, Category::All);
        let q: HostQuery = serde_json::from_str(r#"{"category":"devices"}"#).unwrap();
        assert_eq!(q.category, Category::Named);
        assert!(serde_json::from_str::<HostQuery>(r#"{"category":"printers"}"#).is_err());
        assert_eq!(serde_json::to_value(Category::Named).unwrap(), "named");
    }
}
