//! Bounded worker pool for one protocol's probes.
//!
//! Every port gets its own task. A semaphore caps how many probes are in
//! flight, results travel back over an mpsc channel, and a single collector
//! drains it. A panicking or lost probe turns into an `Error` result for
//! its own port; siblings keep running.

use crate::scanner::rate_limiter::RateLimiter;
use crate::scanner::traits::{ProbeResult, ProbeStatus, Protocol, Scanner};
use crate::types::Port;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of probes in flight per protocol.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Detail carried by results of probes stopped by cancellation.
pub const CANCELLED_DETAIL: &str = "probe cancelled";

/// Runs a prober over a port set with bounded concurrency.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    cancel: CancellationToken,
    observer: Option<mpsc::UnboundedSender<ProbeResult>>,
}

impl WorkerPool {
    /// Create a pool with at most `concurrency` probes in flight.
    ///
    /// A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            rate_limiter: None,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Option<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send a copy of every result to `observer` as it completes.
    pub fn with_observer(mut self, observer: Option<mpsc::UnboundedSender<ProbeResult>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every port in `ports` and return one result per port, in
    /// ascending port order.
    ///
    /// Returns only after every spawned probe has finished or been dropped.
    pub async fn run(&self, scanner: Arc<dyn Scanner>, ports: &BTreeSet<Port>) -> Vec<ProbeResult> {
        let protocol = scanner.protocol();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<(Port, ProbeResult)>(ports.len().max(1));

        debug!(%protocol, ports = ports.len(), concurrency = self.concurrency, "starting worker pool");

        for &port in ports {
            let scanner = Arc::clone(&scanner);
            let semaphore = Arc::clone(&semaphore);
            let limiter = self.rate_limiter.clone();
            let cancel = self.cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        ProbeResult::error(port, protocol, CANCELLED_DETAIL)
                    }
                    result = probe(scanner, semaphore, limiter, port) => result,
                };
                // The collector outlives every sender, so this cannot fail.
                let _ = tx.send((port, result)).await;
            });
        }
        drop(tx);

        let mut collected: BTreeMap<Port, ProbeResult> = BTreeMap::new();
        while let Some((port, mut result)) = rx.recv().await {
            result.port = port.as_u16();
            if result.status == ProbeStatus::Error {
                warn!(%protocol, port = port.as_u16(), detail = ?result.detail, "probe failed");
            }
            if let Some(observer) = &self.observer {
                let _ = observer.send(result.clone());
            }
            collected.entry(port).or_insert(result);
        }

        reconcile(protocol, ports, collected)
    }
}

async fn probe(
    scanner: Arc<dyn Scanner>,
    semaphore: Arc<Semaphore>,
    limiter: Option<RateLimiter>,
    port: Port,
) -> ProbeResult {
    let protocol = scanner.protocol();
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return ProbeResult::error(port, protocol, "worker pool closed"),
    };
    if let Some(limiter) = limiter {
        limiter.wait().await;
    }

    match AssertUnwindSafe(scanner.scan_port(port)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => ProbeResult::error(
            port,
            protocol,
            format!("probe panicked: {}", panic_message(panic.as_ref())),
        ),
    }
}

/// Fill any port the collector never heard from with an `Error` result.
fn reconcile(
    protocol: Protocol,
    ports: &BTreeSet<Port>,
    mut collected: BTreeMap<Port, ProbeResult>,
) -> Vec<ProbeResult> {
    ports
        .iter()
        .map(|&port| {
            collected.remove(&port).unwrap_or_else(|| {
                warn!(%protocol, port = port.as_u16(), "probe produced no result");
                ProbeResult::error(port, protocol, "probe task lost")
            })
        })
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
