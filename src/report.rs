//! Projection of an nmap XML report (`-oX`) onto [`Host`] records.
//!
//! Only addresses, the first hostname, MAC vendor and open TCP ports survive.
//! Input is untrusted subprocess output: parsing never fails, it stops at the
//! first malformed event and keeps every host record completed before it.

use std::collections::HashSet;

use tracing::debug;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

use crate::types::{Host, HostStatus, PortInfo};

const UNKNOWN_SERVICE: &str = "unknown";

#[derive(Default)]
struct HostRecord {
    ipv4: Option<String>,
    hostname: Option<String>,
    mac: Option<String>,
    vendor: Option<String>,
    up: bool,
    ports: Vec<PortInfo>,
    seen_ports: HashSet<u16>,
}

struct PortRecord {
    tcp: bool,
    port: Option<u16>,
    open: bool,
    service: Option<String>,
}

impl HostRecord {
    fn new() -> Self {
        Self {
            up: true,
            ..Self::default()
        }
    }

    fn address(&mut self, attrs: &[OwnedAttribute]) {
        let Some(addr) = attr(attrs, "addr").filter(|a| !a.is_empty()) else {
            return;
        };
        match attr(attrs, "addrtype") {
            Some("ipv4") if self.ipv4.is_none() => self.ipv4 = Some(addr.to_string()),
            Some("mac") if self.mac.is_none() => {
                self.mac = Some(addr.to_string());
                self.vendor = attr(attrs, "vendor").filter(|v| !v.is_empty()).map(str::to_string);
            }
            _ => {}
        }
    }

    fn close_port(&mut self, port: PortRecord) {
        let Some(number) = port.port else { return };
        if !port.tcp || !port.open || !self.seen_ports.insert(number) {
            return;
        }
        let service = port.service.unwrap_or_else(|| UNKNOWN_SERVICE.to_string());
        self.ports.push(PortInfo::open(number, service));
    }

    fn finish(self) -> Option<Host> {
        if !self.up {
            return None;
        }
        let ip = self.ipv4?;
        Some(Host {
            ip,
            hostname: self.hostname,
            mac: self.mac,
            vendor: self.vendor,
            ports: self.ports,
            status: HostStatus::Up,
        })
    }
}

fn attr<'a>(attrs: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.value.as_str())
}

fn parse_port_id(s: &str) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

/// Parse an nmap XML report into hosts, in report order, unique by ip.
pub fn parse_report(raw: &[u8]) -> Vec<Host> {
    let mut hosts: Vec<Host> = Vec::new();
    let mut seen_ips = HashSet::new();
    let mut host: Option<HostRecord> = None;
    let mut port: Option<PortRecord> = None;

    for event in EventReader::new(raw) {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, kept = hosts.len(), "nmap report ended early");
                break;
            }
        };

        match event {
            XmlEvent::StartElement { name, attributes, .. } => {
                let tag = name.local_name.as_str();
                if tag == "host" {
                    host = Some(HostRecord::new());
                    port = None;
                    continue;
                }
                let Some(h) = host.as_mut() else { continue };
                match tag {
                    "address" => h.address(&attributes),
                    "hostname" if h.hostname.is_none() => {
                        h.hostname = attr(&attributes, "name")
                            .filter(|n| !n.is_empty())
                            .map(str::to_string);
                    }
                    "status" => {
                        h.up = attr(&attributes, "state").map_or(true, |s| s == "up");
                    }
                    "port" => {
                        port = Some(PortRecord {
                            tcp: attr(&attributes, "protocol") == Some("tcp"),
                            port: attr(&attributes, "portid").and_then(parse_port_id),
                            open: false,
                            service: None,
                        });
                    }
                    "state" => {
                        if let Some(p) = port.as_mut() {
                            p.open = attr(&attributes, "state") == Some("open");
                        }
                    }
                    "service" => {
                        if let Some(p) = port.as_mut() {
                            p.service = attr(&attributes, "name")
                                .filter(|n| !n.is_empty())
                                .map(str::to_string);
                        }
                    }
                    _ => {}
                }
            }
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "port" => {
                    if let (Some(h), Some(p)) = (host.as_mut(), port.take()) {
                        h.close_port(p);
                    }
                }
                "host" => {
                    port = None;
                    if let Some(h) = host.take().and_then(HostRecord::finish) {
                        if seen_ips.insert(h.ip.clone()) {
                            hosts.push(h);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    hosts
}
