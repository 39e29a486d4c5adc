use std::fmt;

use crate::error::ScanError;

/// Default port selection handed to nmap.
pub const DEFAULT_PORTS: &str = "1-1024";

/// Ports that make a host count as exposing a web service in filters and stats.
pub const WEB_FILTER_PORTS: [u16; 4] = [80, 443, 8080, 8443];

pub fn is_web_filter_port(port: u16) -> bool {
    WEB_FILTER_PORTS.contains(&port)
}

/// A validated nmap `-p` argument.
///
/// Supported forms, comma separated:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Whitespace around items is ignored; the normalized form has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    items: Vec<PortItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortItem {
    Single(u16),
    Range(u16, u16),
}

impl PortSpec {
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        let mut items = Vec::new();
        for raw in s.split(',') {
            let item = raw.trim();
            if item.is_empty() {
                return Err(ScanError::validation("port range", format!("empty item in '{s}'")));
            }

            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())?;
                let end = parse_port_str(b.trim())?;
                if start > end {
                    return Err(ScanError::validation(
                        "port range",
                        format!("invalid range {start}-{end} (start > end)"),
                    ));
                }
                items.push(PortItem::Range(start, end));
                continue;
            }

            items.push(PortItem::Single(parse_port_str(item)?));
        }
        Ok(Self { items })
    }
}

impl Default for PortSpec {
    fn default() -> Self {
        Self {
            items: vec![PortItem::Range(1, 1024)],
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match item {
                PortItem::Single(p) => write!(f, "{p}")?,
                PortItem::Range(a, b) => write!(f, "{a}-{b}")?,
            }
        }
        Ok(())
    }
}

fn parse_port_str(s: &str) -> Result<u16, ScanError> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|_| ScanError::validation("port range", format!("invalid port value: '{s}'")))?;
    if val == 0 || val > 65535 {
        return Err(ScanError::validation("port range", format!("port out of range: {val}")));
    }
    Ok(val as u16)
}
