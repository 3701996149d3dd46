//! Scanner module - coordinates the SYN and UDP probers.
//!
//! [`Engine::scan`] validates the target, builds one prober per requested
//! protocol, runs each protocol's ports through its own [`WorkerPool`], and
//! merges everything into a single ordered [`ScanReport`]. The TCP and UDP
//! pools run at the same time.

pub mod pool;
pub mod rate_limiter;
pub mod raw;
pub mod report;
pub mod response;
pub mod syn;
pub mod traits;
pub mod udp;

use crate::error::{ScanError, ScanResult};
use crate::types::{Port, ScanTarget};
use chrono::Utc;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use pool::{WorkerPool, CANCELLED_DETAIL, DEFAULT_CONCURRENCY};
pub use rate_limiter::RateLimiter;
pub use raw::RawTransport;
pub use report::{aggregate, ScanReport, ScanRequest, StatusCounts};
pub use response::Response;
pub use syn::SynScanner;
pub use traits::{PacketTransport, ProbePacket, ProbeResult, ProbeStatus, Protocol, Scanner};
pub use udp::UdpScanner;

/// Knobs that shape how a scan runs, as opposed to what it scans.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub tcp_concurrency: usize,
    pub udp_concurrency: usize,
    /// Probes per second across both protocols; 0 is unlimited.
    pub rate_limit: u32,
    pub cancel: CancellationToken,
    /// Receives a copy of each result as soon as it is known.
    pub observer: Option<mpsc::UnboundedSender<ProbeResult>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            tcp_concurrency: DEFAULT_CONCURRENCY,
            udp_concurrency: DEFAULT_CONCURRENCY,
            rate_limit: 0,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }
}

/// The scan entry point.
pub struct Engine {
    transport: Arc<dyn PacketTransport>,
    options: ScanOptions,
}

impl Engine {
    /// Create an engine sending through `transport`.
    pub fn new(transport: Arc<dyn PacketTransport>) -> Self {
        Self {
            transport,
            options: ScanOptions::default(),
        }
    }

    /// Create an engine backed by raw sockets.
    pub fn raw() -> Self {
        Self::new(Arc::new(RawTransport::new()))
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Run a scan to completion (or cancellation).
    ///
    /// Never fails: an invalid target yields the single-row
    /// `InvalidTarget` report and sends nothing, and every probe failure
    /// becomes an `Error` row for its own port.
    pub async fn scan(&self, request: &ScanRequest) -> ScanReport {
        let started_at = Utc::now();
        let target = match ScanTarget::parse(&request.target) {
            Ok(target) => target,
            Err(e) => {
                warn!(host = %request.target, "{}", e);
                return ScanReport::invalid_target(&request.target);
            }
        };

        info!(
            host = %target,
            tcp_ports = request.tcp_ports.as_ref().map_or(0, BTreeSet::len),
            udp_ports = request.udp_ports.as_ref().map_or(0, BTreeSet::len),
            "starting scan"
        );

        let limiter = RateLimiter::new(self.options.rate_limit);
        let tcp = self.run_protocol(
            Protocol::Tcp,
            target.ip(),
            request.tcp_ports.as_ref(),
            request.tcp_timeout,
            self.options.tcp_concurrency,
            limiter.clone(),
        );
        let udp = self.run_protocol(
            Protocol::Udp,
            target.ip(),
            request.udp_ports.as_ref(),
            request.udp_timeout,
            self.options.udp_concurrency,
            limiter,
        );
        let (tcp, udp) = tokio::join!(tcp, udp);

        let report = ScanReport::new(request.target.clone(), started_at, aggregate(tcp, udp));
        info!(
            host = %target,
            results = report.len(),
            open = report.counts.open,
            duration_ms = report.duration_ms,
            "scan finished"
        );
        report
    }

    /// Run a scan on a fresh runtime, for callers that are not async.
    ///
    /// # Errors
    /// Returns an error when called from inside a Tokio runtime, or if the
    /// runtime cannot be built.
    pub fn scan_blocking(&self, request: &ScanRequest) -> ScanResult<ScanReport> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ScanError::Runtime(
                "scan_blocking called from inside an async runtime; use scan instead".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ScanError::Runtime(e.to_string()))?;
        Ok(runtime.block_on(self.scan(request)))
    }

    async fn run_protocol(
        &self,
        protocol: Protocol,
        target: IpAddr,
        ports: Option<&BTreeSet<Port>>,
        timeout: Duration,
        concurrency: usize,
        limiter: Option<RateLimiter>,
    ) -> Vec<ProbeResult> {
        let Some(ports) = ports.filter(|ports| !ports.is_empty()) else {
            return Vec::new();
        };

        let scanner = match self.build_scanner(protocol, target, timeout) {
            Ok(scanner) => scanner,
            Err(e) => {
                warn!(%protocol, host = %target, "cannot start prober: {}", e);
                let detail = e.to_string();
                return ports
                    .iter()
                    .map(|&port| ProbeResult::error(port, protocol, detail.clone()))
                    .collect();
            }
        };

        WorkerPool::new(concurrency)
            .with_rate_limiter(limiter)
            .with_cancellation(self.options.cancel.clone())
            .with_observer(self.options.observer.clone())
            .run(scanner, ports)
            .await
    }

    fn build_scanner(
        &self,
        protocol: Protocol,
        target: IpAddr,
        timeout: Duration,
    ) -> ScanResult<Arc<dyn Scanner>> {
        let transport = Arc::clone(&self.transport);
        let scanner: Arc<dyn Scanner> = match protocol {
            Protocol::Tcp => Arc::new(SynScanner::new(target, timeout, transport)?),
            Protocol::Udp => Arc::new(UdpScanner::new(target, timeout, transport)?),
        };
        Ok(scanner)
    }
}

/// Hand a probe to the transport on the blocking pool and time the wait.
pub(crate) async fn exchange(
    transport: Arc<dyn PacketTransport>,
    packet: ProbePacket,
    timeout: Duration,
) -> (Response, Duration) {
    let started = Instant::now();
    let response = tokio::task::spawn_blocking(move || transport.send_and_wait(&packet, timeout))
        .await
        .unwrap_or_else(|e| Response::RawError {
            detail: format!("probe task failed: {}", e),
        });
    (response, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.tcp_concurrency, 20);
        assert_eq!(options.udp_concurrency, 20);
        assert_eq!(options.rate_limit, 0);
        assert!(!options.cancel.is_cancelled());
    }
}
