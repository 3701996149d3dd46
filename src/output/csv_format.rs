//! CSV output formatting.

use crate::scanner::ScanReport;
use crate::services::ServiceTable;
use std::io::{self, Write};

/// Write one CSV row per result.
pub fn write_csv(out: &mut dyn Write, report: &ScanReport, services: &ServiceTable) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["port", "protocol", "status", "service", "detail", "response_time_ms"])?;

    for result in &report.results {
        wtr.write_record([
            &result.port.to_string(),
            &result.protocol.map_or(String::new(), |p| p.to_string()),
            &result.status.to_string(),
            services.name(result.port, result.protocol),
            result.detail.as_deref().unwrap_or(""),
            &result.response_time_ms.map_or(String::new(), |t| t.to_string()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{aggregate, ProbeResult, ProbeStatus, Protocol};
    use crate::types::Port;
    use chrono::Utc;

    #[test]
    fn test_csv_rows() {
        let results = aggregate(
            vec![ProbeResult::new(Port::new(80).unwrap(), Protocol::Tcp, ProbeStatus::Open)
                .with_response_time(12)],
            vec![ProbeResult::error(Port::new(53).unwrap(), Protocol::Udp, "no route, host down")],
        );
        let report = ScanReport::new("10.1.1.1", Utc::now(), results);

        let mut buffer = Vec::new();
        write_csv(&mut buffer, &report, &ServiceTable::builtin()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "port,protocol,status,service,detail,response_time_ms");
        assert_eq!(lines[1], "53,udp,error,dns,\"no route, host down\",");
        assert_eq!(lines[2], "80,tcp,open,http,,12");
    }
}
