//! Source-IP allow-list.
//!
//! Entries are exact addresses or CIDR ranges, v4 and v6. An empty list
//! denies every source; the metrics endpoint is only reachable once an
//! operator has said who may scrape it.

use std::net::IpAddr;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Rule {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix_len: u8 },
}

impl Rule {
    fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if let Some((addr, prefix)) = entry.split_once('/') {
            let network: IpAddr = addr
                .parse()
                .map_err(|_| Error::Config(format!("invalid allow-list address '{entry}'")))?;
            let prefix_len: u8 = prefix
                .parse()
                .map_err(|_| Error::Config(format!("invalid CIDR prefix '{entry}'")))?;
            let max = match network {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            if prefix_len > max {
                return Err(Error::Config(format!("CIDR prefix out of range '{entry}'")));
            }
            Ok(Rule::Cidr {
                network,
                prefix_len,
            })
        } else {
            let addr: IpAddr = entry
                .parse()
                .map_err(|_| Error::Config(format!("invalid allow-list address '{entry}'")))?;
            Ok(Rule::Exact(addr))
        }
    }

    fn matches(&self, ip: IpAddr) -> bool {
        match *self {
            Rule::Exact(allowed) => allowed == ip,
            Rule::Cidr {
                network,
                prefix_len,
            } => match (network, ip) {
                (IpAddr::V4(net), IpAddr::V4(ip)) => {
                    let mask = if prefix_len == 0 {
                        0
                    } else {
                        u32::MAX << (32 - u32::from(prefix_len))
                    };
                    u32::from(net) & mask == u32::from(ip) & mask
                }
                (IpAddr::V6(net), IpAddr::V6(ip)) => {
                    let mask = if prefix_len == 0 {
                        0
                    } else {
                        u128::MAX << (128 - u32::from(prefix_len))
                    };
                    u128::from(net) & mask == u128::from(ip) & mask
                }
                // Mixed families never match.
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    rules: Vec<Rule>,
}

impl IpAllowlist {
    /// Parse a mixed list of exact addresses and CIDR ranges. Fails on
    /// the first malformed entry so a typo never silently widens or
    /// narrows access.
    pub fn parse(entries: &[String]) -> Result<Self> {
        let rules = entries
            .iter()
            .map(|e| Rule::parse(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Whether `ip` may pass. Empty lists deny everything.
    pub fn allows(&self, ip: IpAddr) -> bool {
        self.rules.iter().any(|rule| rule.matches(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
