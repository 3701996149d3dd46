//! JSON output formatting.

use crate::scanner::{ProbeResult, ScanReport, StatusCounts};
use crate::services::ServiceTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: u64,
    counts: StatusCounts,
    results: Vec<JsonResult<'a>>,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    #[serde(flatten)]
    result: &'a ProbeResult,
    #[serde(skip_serializing_if = "no_service")]
    service: &'a str,
}

fn no_service(service: &&str) -> bool {
    service.is_empty()
}

/// Write the report as pretty-printed JSON, one object per result with its
/// service name attached.
pub fn write_json(out: &mut dyn Write, report: &ScanReport, services: &ServiceTable) -> io::Result<()> {
    let document = JsonReport {
        target: &report.target,
        started_at: report.started_at,
        finished_at: report.finished_at,
        duration_ms: report.duration_ms,
        counts: report.counts,
        results: report
            .results
            .iter()
            .map(|result| JsonResult {
                result,
                service: services.name(result.port, result.protocol),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &document).map_err(io::Error::other)?;
    writeln!(out)
}
