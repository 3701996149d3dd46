//! Core type definitions using newtype patterns for type safety.
//!
//! These types keep invalid ports and targets out of the scan engine.

mod port;
mod target;

pub use port::{parse_port_set, Port, PortError, PortRange, PortSpec};
pub use target::{ScanTarget, TargetError};
