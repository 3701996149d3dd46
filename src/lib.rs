//! # halfscan - half-open port state scanning
//!
//! halfscan works out whether TCP and UDP ports on a host are open, closed,
//! or filtered. TCP ports get a single SYN and never a completed handshake;
//! UDP ports get a single empty datagram. Replies (or silence) are
//! classified per port and merged into one ordered report.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use halfscan::scanner::{Engine, ScanRequest};
//! use halfscan::types::parse_port_set;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let request = ScanRequest::new("192.168.1.1")
//!     .with_tcp_ports(parse_port_set("22,80,443")?)
//!     .with_udp_ports(parse_port_set("53")?);
//!
//! let report = Engine::raw().scan(&request).await;
//! for result in &report.results {
//!     println!("{}/{:?} is {}", result.port, result.protocol, result.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Validated ports, port-set parsing, and target addresses
//! - [`scanner`] - Probers, the worker pool, aggregation, and the [`Engine`]
//! - [`services`] - Port to service-name table used by the renderers
//! - [`config`] - Persisted settings
//! - [`output`] - Plain, JSON, and CSV renderers
//! - [`cli`] - The `halfscan` command line
//! - [`error`] - Error types
//!
//! Sending raw packets needs root (or `CAP_NET_RAW`). Without it every probe
//! comes back as an `error` result rather than failing the scan.

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ConfigError, ScanError};
pub use scanner::{
    Engine, PacketTransport, ProbeResult, ProbeStatus, Protocol, ScanOptions, ScanReport,
    ScanRequest, Scanner,
};
pub use services::ServiceTable;
pub use types::{parse_port_set, Port, PortSpec, ScanTarget};
