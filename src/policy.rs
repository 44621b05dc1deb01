// SPDX-License-Identifier: MIT

//! Whitelist policy
//!
//! Decides which addresses must never be blocked: configured whitelist
//! subnets plus everything that is not a public unicast address. Private and
//! reserved space is implicitly whitelisted so a misparsed log line can never
//! lock an operator out of their own LAN.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

/// Parses whitelist entries (CIDR or bare IPs, v4 and v6)
///
/// Invalid entries are logged and skipped rather than failing adapter
/// construction; a typo in one subnet must not disable blocking entirely.
#[must_use]
pub fn parse_whitelist(entries: &[String]) -> Vec<IpNetwork> {
    let mut networks = Vec::with_capacity(entries.len());
    for entry in entries {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed = if trimmed.contains('/') {
            trimmed.parse::<IpNetwork>().ok()
        } else {
            trimmed.parse::<IpAddr>().ok().map(IpNetwork::from)
        };
        match parsed {
            Some(network) => networks.push(network),
            None => tracing::warn!("Ignoring invalid whitelist entry: {}", trimmed),
        }
    }
    networks
}

/// Whether an address must never be blocked
///
/// True when the string is not a parseable IP, when the address is not
/// public unicast space, or when any whitelist network contains it.
#[must_use]
pub fn is_whitelisted(ip: &str, whitelist: &[IpNetwork]) -> bool {
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return true;
    };

    if !is_public(addr) {
        return true;
    }

    whitelist.iter().any(|network| network.contains(addr))
}

fn is_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(addr: Ipv4Addr) -> bool {
    !(addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.is_unspecified()
        // CGNAT 100.64.0.0/10
        || (addr.octets()[0] == 100 && (addr.octets()[1] & 0xC0) == 64))
}

fn is_public_v6(addr: Ipv6Addr) -> bool {
    let segments = addr.segments();
    !(addr.is_loopback()
        || addr.is_unspecified()
        // unique-local fc00::/7
        || (segments[0] & 0xFE00) == 0xFC00
        // link-local fe80::/10
        || (segments[0] & 0xFFC0) == 0xFE80)
}
