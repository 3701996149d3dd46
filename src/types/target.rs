//! Target validation.
//!
//! The scan core only accepts IPv4 and IPv6 literals. Hostname resolution
//! belongs to the caller and must happen before a scan request is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A validated scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanTarget(IpAddr);

impl ScanTarget {
    /// Validate a target address string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        s.parse::<IpAddr>()
            .map(Self)
            .map_err(|_| TargetError::InvalidAddress(s.to_string()))
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }

    pub fn is_ipv6(&self) -> bool {
        self.0.is_ipv6()
    }
}

impl From<IpAddr> for ScanTarget {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl FromStr for ScanTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for target validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target address: '{0}' is not an IPv4 or IPv6 literal")]
    InvalidAddress(String),
}
