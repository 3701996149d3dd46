//! Output formatting module.
//!
//! Renders a finished [`ScanReport`] as plain text, JSON, or CSV. Service
//! names come from the [`ServiceTable`] handed in by the caller. The plain
//! renderer hides closed ports unless asked; JSON and CSV always carry
//! every result.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_scan_header, print_warning, write_plain};

use crate::config::OutputFormat;
use crate::scanner::ScanReport;
use crate::services::ServiceTable;
use std::io::{self, Write};

/// Render `report` to `out` in the requested format.
pub fn write_report(
    out: &mut dyn Write,
    report: &ScanReport,
    format: OutputFormat,
    services: &ServiceTable,
    show_closed: bool,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_plain(out, report, services, show_closed),
        OutputFormat::Json => json_format::write_json(out, report, services),
        OutputFormat::Csv => csv_format::write_csv(out, report, services),
    }
}

/// Render `report` to standard output.
pub fn print_report(
    report: &ScanReport,
    format: OutputFormat,
    services: &ServiceTable,
    show_closed: bool,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, format, services, show_closed)?;
    out.flush()
}
