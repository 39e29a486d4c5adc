use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::ScanError;

/// Default target handed to nmap when the caller gives none.
pub const DEFAULT_RANGE: &str = "192.168.1.0/24";

/// A validated nmap target expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRange {
    /// `a.b.c.d`
    Single(Ipv4Addr),
    /// `a.b.c.d/n`
    Cidr(Ipv4Net),
    /// `a.b.c.d-n`: last octet runs from `d` to `n` inclusive.
    Dash { start: Ipv4Addr, last_octet: u8 },
}

impl TargetRange {
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        let s = s.trim();
        let invalid = || {
            ScanError::validation(
                "IP range",
                format!(
                    "'{s}'. Use CIDR notation (e.g., 192.168.1.0/24), an IP range (e.g., 192.168.1.1-254) or a single IP"
                ),
            )
        };

        if let Some((addr, prefix)) = s.split_once('/') {
            let addr = parse_dotted_quad(addr).ok_or_else(invalid)?;
            let prefix: u8 = parse_small_number(prefix).ok_or_else(invalid)?;
            let net = Ipv4Net::new(addr, prefix).map_err(|_| invalid())?;
            return Ok(Self::Cidr(net));
        }

        if let Some((addr, last)) = s.split_once('-') {
            let start = parse_dotted_quad(addr).ok_or_else(invalid)?;
            let last_octet: u8 = parse_small_number(last).ok_or_else(invalid)?;
            if last_octet < start.octets()[3] {
                return Err(invalid());
            }
            return Ok(Self::Dash { start, last_octet });
        }

        parse_dotted_quad(s).map(Self::Single).ok_or_else(invalid)
    }

    /// Number of addresses nmap will consider.
    pub fn address_count(&self) -> u64 {
        match self {
            Self::Single(_) => 1,
            Self::Cidr(net) => 1u64 << (32 - net.prefix_len()),
            Self::Dash { start, last_octet } => u64::from(*last_octet - start.octets()[3]) + 1,
        }
    }

    /// Best guess at the router address for this range: the first host of its /24.
    pub fn likely_gateway(&self) -> Ipv4Addr {
        let base = match self {
            Self::Single(ip) => *ip,
            Self::Cidr(net) => net.network(),
            Self::Dash { start, .. } => *start,
        };
        let o = ipv4_to_default_cidr(base).network().octets();
        Ipv4Addr::new(o[0], o[1], o[2], 1)
    }
}

impl fmt::Display for TargetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{ip}"),
            Self::Cidr(net) => write!(f, "{net}"),
            Self::Dash { start, last_octet } => write!(f, "{start}-{last_octet}"),
        }
    }
}

/// Strict dotted quad: four decimal octets of one to three digits each.
fn parse_dotted_quad(s: &str) -> Option<Ipv4Addr> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(parts) {
        *slot = parse_small_number(part)?;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_small_number(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Detect local non-loopback IPv4 addresses and convert each to a default /24 CIDR network.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1.0/24`.
/// Duplicates are removed.
pub fn detect_local_cidrs() -> Result<Vec<Ipv4Net>> {
    let mut set = HashSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() {
                continue;
            }
            set.insert(ipv4_to_default_cidr(ip));
        }
    }
    let mut cidrs: Vec<Ipv4Net> = set.into_iter().collect();
    // Sort for stable output
    cidrs.sort_by_key(|n| (u32::from(n.network()), n.prefix_len()));
    Ok(cidrs)
}

/// Helper: convert an IPv4 address into its default /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    Ipv4Net::new(ip, 24).expect("/24 is always valid").trunc()
}
