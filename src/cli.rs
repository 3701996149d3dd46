//! Command-line interface for halfscan.
//!
//! Uses `clap` derive macros for declarative argument parsing. Flags
//! override the persisted [`AppSettings`].

use crate::config::{AppSettings, OutputFormat};
use crate::error::{CliResult, ConfigError};
use crate::output;
use crate::scanner::{Engine, ProbeResult, ProbeStatus, ScanOptions, ScanRequest};
use crate::services::ServiceTable;
use crate::types::parse_port_set;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// TCP ports probed when neither `--tcp` nor `--udp` is given.
pub const DEFAULT_TCP_PORTS: &str = "1-1000";

/// Half-open TCP SYN and UDP port state scanner.
#[derive(Parser, Debug)]
#[command(name = "halfscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Half-open TCP SYN and UDP port state scanner", long_about = None)]
pub struct Args {
    /// Target IP address (a hostname is resolved first)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// TCP ports to SYN-probe (e.g., "80", "80,443", "1-1000", "22,80,8000-9000")
    #[arg(short = 't', long = "tcp", value_name = "PORTS")]
    pub tcp_ports: Option<String>,

    /// UDP ports to probe
    #[arg(short = 'u', long = "udp", value_name = "PORTS")]
    pub udp_ports: Option<String>,

    /// Wait for a TCP reply, in milliseconds
    #[arg(long, value_name = "MS")]
    pub tcp_timeout: Option<u64>,

    /// Wait for a UDP reply, in milliseconds
    #[arg(long, value_name = "MS")]
    pub udp_timeout: Option<u64>,

    /// Maximum TCP probes in flight
    #[arg(long, value_name = "N")]
    pub tcp_concurrency: Option<usize>,

    /// Maximum UDP probes in flight
    #[arg(long, value_name = "N")]
    pub udp_concurrency: Option<usize>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate", value_name = "PPS")]
    pub rate_limit: Option<u32>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Show closed ports in output
    #[arg(long)]
    pub show_closed: bool,

    /// Service table JSON file
    #[arg(long, value_name = "FILE")]
    pub services: Option<PathBuf>,

    /// Path to a settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging and a progress bar)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Run a scan as described by `args` and print the report.
pub async fn run(args: Args) -> CliResult<()> {
    let settings = load_settings(args.config.as_ref())?;

    let services = match args.services.as_ref().or(settings.services_file.as_ref()) {
        Some(path) => ServiceTable::from_json_file(path)?,
        None => ServiceTable::builtin(),
    };
    let format = args.output.unwrap_or(settings.output_format);
    let show_closed = args.show_closed || settings.show_closed;

    let target = resolve_target(&args.target).await;
    let request = build_request(&args, &settings, target)?;

    if !args.quiet && !is_root() {
        output::print_warning("SYN and UDP probes need root/sudo privileges for raw socket access.");
        output::print_warning("Without them every port will be reported as an error.");
    }
    if !args.quiet && format == OutputFormat::Plain {
        output::print_scan_header(
            &request.target,
            request.tcp_ports.as_ref().map_or(0, |p| p.len()),
            request.udp_ports.as_ref().map_or(0, |p| p.len()),
        );
    }

    let (observer, progress) = if args.verbose {
        let (tx, rx) = mpsc::unbounded_channel();
        let bar = progress_bar(request.probe_count() as u64);
        (Some(tx), Some(tokio::spawn(track_progress(rx, bar))))
    } else {
        (None, None)
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling outstanding probes");
                cancel.cancel();
            }
        })
    };

    let engine = Engine::raw().with_options(ScanOptions {
        cancel,
        observer,
        ..scan_options(&args, &settings)
    });
    let report = engine.scan(&request).await;
    // Dropping the engine closes the observer channel so the bar can finish.
    drop(engine);
    interrupt.abort();
    if let Some(progress) = progress {
        finish_progress(progress).await;
    }

    output::print_report(&report, format, &services, show_closed)?;
    Ok(())
}

/// Settings from `--config`, else the default location.
///
/// A system with no resolvable home directory falls back to defaults.
fn load_settings(path: Option<&PathBuf>) -> CliResult<AppSettings> {
    match path {
        Some(path) => Ok(AppSettings::load_from(path)?),
        None => match AppSettings::load() {
            Err(ConfigError::DirectoryNotFound) => Ok(AppSettings::default()),
            other => Ok(other?),
        },
    }
}

/// Turn arguments and settings into a scan request for `target`.
///
/// # Errors
/// Fails when a port specification does not parse.
pub fn build_request(args: &Args, settings: &AppSettings, target: String) -> CliResult<ScanRequest> {
    let mut request = ScanRequest::new(target)
        .with_tcp_timeout(
            args.tcp_timeout
                .map_or(settings.tcp_timeout(), Duration::from_millis),
        )
        .with_udp_timeout(
            args.udp_timeout
                .map_or(settings.udp_timeout(), Duration::from_millis),
        );

    let tcp_spec = match (&args.tcp_ports, &args.udp_ports) {
        (None, None) => Some(DEFAULT_TCP_PORTS),
        (tcp, _) => tcp.as_deref(),
    };
    if let Some(spec) = tcp_spec {
        request = request.with_tcp_ports(parse_port_set(spec)?);
    }
    if let Some(spec) = &args.udp_ports {
        request = request.with_udp_ports(parse_port_set(spec)?);
    }
    Ok(request)
}

/// Concurrency and rate options from arguments and settings.
pub fn scan_options(args: &Args, settings: &AppSettings) -> ScanOptions {
    ScanOptions {
        tcp_concurrency: args.tcp_concurrency.unwrap_or(settings.tcp_concurrency),
        udp_concurrency: args.udp_concurrency.unwrap_or(settings.udp_concurrency),
        rate_limit: args.rate_limit.unwrap_or(settings.rate_limit),
        ..ScanOptions::default()
    }
}

/// Resolve a hostname or IP address string to the address to scan.
///
/// IP literals pass through untouched. When resolution fails the original
/// string is returned and the engine reports it as an invalid target.
pub async fn resolve_target(target: &str) -> String {
    let trimmed = target.trim();
    if trimmed.parse::<IpAddr>().is_ok() {
        return trimmed.to_string();
    }

    use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
    use trust_dns_resolver::TokioAsyncResolver;

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    match resolver.lookup_ip(trimmed).await {
        Ok(response) => match response.iter().next() {
            Some(ip) => {
                debug!(host = trimmed, %ip, "resolved target");
                ip.to_string()
            }
            None => {
                warn!(host = trimmed, "no addresses found");
                target.to_string()
            }
        },
        Err(e) => {
            warn!(host = trimmed, "failed to resolve: {}", e);
            target.to_string()
        }
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar
}

async fn track_progress(mut results: mpsc::UnboundedReceiver<ProbeResult>, bar: ProgressBar) {
    while let Some(result) = results.recv().await {
        bar.inc(1);
        if result.status == ProbeStatus::Open {
            if let Some(protocol) = result.protocol {
                bar.set_message(format!("Found open port: {}/{}", result.port, protocol));
            }
        }
    }
    bar.finish_with_message("Scan complete");
}

/// Wait for the progress display to drain. A failed display never fails the scan.
async fn finish_progress(progress: JoinHandle<()>) {
    if let Err(e) = progress.await {
        warn!("progress display failed: {}", e);
    }
}

/// Check if running with root/admin privileges.
fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
