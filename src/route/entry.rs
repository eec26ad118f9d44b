//! Route list line classification
//!
//! Each line of a routes file is a comment, an IPv4 literal (optionally with
//! a prefix length or dotted mask), or a domain name to resolve.

use ipnetwork::{ipv4_mask_to_prefix, Ipv4Network};
use std::net::Ipv4Addr;

/// One classified line of the routes file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEntry<'a> {
    /// Blank or `#` line, written out unchanged
    Passthrough(&'a str),
    /// IPv4 address or CIDR block, routed as given
    Network {
        network: Ipv4Network,
        source: &'a str,
    },
    /// Anything else, resolved via DNS
    Domain(&'a str),
}

impl<'a> RouteEntry<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();

        if let Some(network) = parse_network(trimmed) {
            RouteEntry::Network {
                network,
                source: trimmed,
            }
        } else if trimmed.is_empty() || trimmed.starts_with('#') {
            RouteEntry::Passthrough(line)
        } else {
            RouteEntry::Domain(trimmed)
        }
    }
}

/// Parse `a.b.c.d`, `a.b.c.d/N` or `a.b.c.d/m.m.m.m`
///
/// Host bits are allowed; callers use [`Ipv4Network::network`] to drop them.
/// A bare address is a /32.
pub fn parse_network(text: &str) -> Option<Ipv4Network> {
    let (addr, prefix) = match text.split_once('/') {
        Some((addr, mask)) => (addr, parse_prefix(mask)?),
        None => (text, 32),
    };
    let addr: Ipv4Addr = addr.parse().ok()?;
    Ipv4Network::new(addr, prefix).ok()
}

fn parse_prefix(mask: &str) -> Option<u8> {
    if !mask.is_empty() && mask.bytes().all(|b| b.is_ascii_digit()) {
        let prefix: u8 = mask.parse().ok()?;
        return (prefix <= 32).then_some(prefix);
    }

    // Dotted form: a netmask, or failing that a hostmask
    let mask: Ipv4Addr = mask.parse().ok()?;
    ipv4_mask_to_prefix(mask)
        .or_else(|_| ipv4_mask_to_prefix(Ipv4Addr::from(!u32::from(mask))))
        .ok()
}

/// Widen a resolved address to the subnet route that covers it
pub fn reduce_to_subnet(addr: Ipv4Addr, prefix: u8) -> Option<Ipv4Network> {
    let subnet = Ipv4Network::new(addr, prefix).ok()?;
    Ipv4Network::new(subnet.network(), prefix).ok()
}
