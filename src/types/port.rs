//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortRange` and `PortSpec` turn a textual specification such as
//! `"22,80,8000-8010"` into an ascending, deduplicated port set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value.into()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Port range parse error.
///
/// Raised before any probe is dispatched; a malformed specification never
/// leads to a partial scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u64),
    #[error("invalid port number: '{0}'")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// A range of ports (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    /// Create a new port range. Inverted bounds are rejected, never swapped.
    pub fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start > end {
            Err(PortError::InvalidRange(start.0, end.0))
        } else {
            Ok(Self { start, end })
        }
    }

    /// Create a range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all ports in this range.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A complete port specification made of one or more ranges.
///
/// Supports formats like:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "1-1000"
/// - Mixed: "22,80,443,8000-9000"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    /// Create an empty port specification.
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn add_range(&mut self, range: PortRange) {
        self.ranges.push(range);
    }

    pub fn add_port(&mut self, port: Port) {
        self.ranges.push(PortRange::single(port));
    }

    /// All ports as an ascending, deduplicated set.
    pub fn to_set(&self) -> BTreeSet<Port> {
        self.ranges.iter().flat_map(PortRange::iter).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut spec = Self::new();
        for part in s.split(',') {
            let part = part.trim();
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    spec.add_range(PortRange::new(start, end)?);
                }
                None => spec.add_port(parse_port(part)?),
            }
        }

        Ok(spec)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parse a port set straight from text.
pub fn parse_port_set(spec: &str) -> Result<BTreeSet<Port>, PortError> {
    spec.parse::<PortSpec>().map(|spec| spec.to_set())
}

fn parse_port(token: &str) -> Result<Port, PortError> {
    let token = token.trim();
    // Parse wide so "70000" reports out-of-range rather than a format error.
    let value: u64 = token
        .parse()
        .map_err(|_| PortError::InvalidFormat(token.to_string()))?;
    u16::try_from(value)
        .ok()
        .and_then(Port::new)
        .ok_or(PortError::OutOfRange(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(spec: &str) -> Vec<u16> {
        parse_port_set(spec)
            .unwrap()
            .into_iter()
            .map(Port::as_u16)
            .collect()
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert_eq!(Port::try_from(0), Err(PortError::OutOfRange(0)));
    }

    #[test]
    fn test_port_range() {
        let range = PortRange::new(Port::new(1).unwrap(), Port::new(100).unwrap()).unwrap();
        assert_eq!(range.len(), 100);
        assert_eq!(range.to_string(), "1-100");
    }

    #[test]
    fn test_port_spec_parsing() {
        assert_eq!(ports("80,443"), vec![80, 443]);
        assert_eq!(ports("20-22"), vec![20, 21, 22]);
        assert_eq!(ports("20-22,25"), vec![20, 21, 22, 25]);
        assert_eq!(ports(" 53, 67 ,123 "), vec![53, 67, 123]);
    }

    #[test]
    fn test_port_spec_dedup() {
        assert_eq!(ports("1-3,2-4"), vec![1, 2, 3, 4]);
        assert_eq!(ports("443,80,80,443"), vec![80, 443]);
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert_eq!(
            parse_port_set("abc"),
            Err(PortError::InvalidFormat("abc".to_string()))
        );
        assert!(matches!(
            parse_port_set("80,,443"),
            Err(PortError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_port_set("1-2-3"),
            Err(PortError::InvalidFormat(_))
        ));
        assert!(matches!(parse_port_set("10-"), Err(PortError::InvalidFormat(_))));
        assert_eq!(parse_port_set("   "), Err(PortError::Empty));
    }

    #[test]
    fn test_rejects_out_of_bounds_and_inverted() {
        assert_eq!(parse_port_set("0"), Err(PortError::OutOfRange(0)));
        assert_eq!(parse_port_set("70000"), Err(PortError::OutOfRange(70000)));
        assert_eq!(parse_port_set("1-65536"), Err(PortError::OutOfRange(65536)));
        assert_eq!(parse_port_set("100-50"), Err(PortError::InvalidRange(100, 50)));
    }
}
