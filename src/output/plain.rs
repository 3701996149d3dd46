//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::scanner::{ProbeStatus, ScanReport};
use crate::services::ServiceTable;
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write results in human-readable plain text format.
///
/// Closed ports are summarized in a single line unless `show_closed` is set.
pub fn write_plain(
    out: &mut dyn Write,
    report: &ScanReport,
    services: &ServiceTable,
    show_closed: bool,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                    {} Scan Results", style("halfscan").cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    if report.is_invalid_target() {
        writeln!(
            out,
            "  {} {} is not a valid IPv4 or IPv6 address",
            style("Invalid target:").red().bold(),
            report.target
        )?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(
        out,
        "  {} {}",
        style("Started:").bold(),
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out)?;

    let counts = &report.counts;
    writeln!(
        out,
        "  {} {} probes in {:.2}s",
        style("Statistics:").bold(),
        report.len(),
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} open|filtered, {} closed, {} filtered",
        style(counts.open).green().bold(),
        style(counts.open_filtered).green(),
        style(counts.closed).red(),
        style(counts.filtered).yellow()
    )?;
    if counts.unknown + counts.error > 0 {
        writeln!(
            out,
            "               {} unknown, {} errors",
            style(counts.unknown).magenta(),
            style(counts.error).red().bold()
        )?;
    }
    writeln!(out)?;

    let shown: Vec<_> = report
        .results
        .iter()
        .filter(|r| show_closed || r.status != ProbeStatus::Closed)
        .collect();

    if shown.is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:<11}  {:<14}  {:<15}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("DETAIL").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in shown {
            let status_style = match result.status {
                ProbeStatus::Open => Style::new().green().bold(),
                ProbeStatus::OpenFiltered => Style::new().green(),
                ProbeStatus::Closed => Style::new().red(),
                ProbeStatus::Filtered => Style::new().yellow(),
                ProbeStatus::Unknown => Style::new().magenta(),
                ProbeStatus::Error | ProbeStatus::InvalidTarget => Style::new().red().bold(),
            };
            let port = match result.protocol {
                Some(protocol) => format!("{}/{}", result.port, protocol),
                None => result.port.to_string(),
            };
            let detail = result
                .detail
                .as_deref()
                .map(|d| truncate_string(d, 35))
                .unwrap_or_default();

            writeln!(
                out,
                "  {:<11}  {:<14}  {:<15}  {}",
                port,
                status_style.apply_to(result.status.to_string()),
                services.name(result.port, result.protocol),
                style(detail).dim()
            )?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    if !show_closed && counts.closed > 0 {
        writeln!(out, "  Not shown: {} closed ports", counts.closed)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &str, tcp_ports: usize, udp_ports: usize) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("halfscan").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{} Target: {}", style("•").dim(), style(target).white().bold());
    eprintln!(
        "{} Probing {} TCP and {} UDP ports...",
        style("•").dim(),
        style(tcp_ports).white().bold(),
        style(udp_ports).white().bold()
    );
    eprintln!();
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
