//! Caller-address allow-listing against published network ranges.
//!
//! GitHub publishes the source ranges of webhook deliveries in the `hooks`
//! array of `https://api.github.com/meta`. The gate fetches that list on every
//! delivery and asks [`HookRanges::contains`] whether the caller is inside it.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::InvalidRange;

/// A parsed set of allowed networks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HookRanges {
    networks: Vec<IpNet>,
}

impl HookRanges {
    /// Parses CIDR blocks (or bare addresses, taken as single-host networks).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRange`] for the first entry that is neither.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, InvalidRange> {
        let networks = entries
            .iter()
            .map(|entry| parse_network(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    /// Returns `true` iff `ip` is inside at least one network.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`), as reported by
    /// dual-stack listeners, are matched as their IPv4 form.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.networks.iter().any(|network| network.contains(&ip))
    }

    /// Number of parsed networks.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Returns `true` when no networks were published.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

fn parse_network(entry: &str) -> Result<IpNet, InvalidRange> {
    let trimmed = entry.trim();
    trimmed
        .parse::<IpNet>()
        .or_else(|_| trimmed.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| InvalidRange {
            entry: entry.to_string(),
        })
}

/// Convenience wrapper: parses `ranges` and tests `ip` against them.
///
/// # Errors
///
/// Returns [`InvalidRange`] if any entry is malformed, even when an earlier
/// entry would have matched.
pub fn is_allowed<S: AsRef<str>>(ip: IpAddr, ranges: &[S]) -> Result<bool, InvalidRange> {
    Ok(HookRanges::parse(ranges)?.contains(ip))
}
