//! Renderers for the run summary.

use anyhow::anyhow;

use reattach_engine::RunReport;

use crate::cli::{CliError, CliResult, OutputFormat};

pub(crate) fn render_report(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(report)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => {
            println!("{:<20} {}", "records seen", report.records_seen);
            println!("{:<20} {}", "matched", report.matched);
            println!("{:<20} {}", "downloaded", report.downloaded);
            println!("{:<20} {}", "uploaded", report.uploaded);
            if report.linked > 0 {
                println!("{:<20} {}", "linked", report.linked);
            }
            if report.deleted > 0 {
                println!("{:<20} {}", "originals deleted", report.deleted);
            }
            println!("{:<20} {}", "failed", report.failed);
            if report.delete_phase_skipped {
                println!("{:<20} skipped", "delete phase");
            }
            if let Some(work_key) = &report.work_key {
                println!("{:<20} {work_key}", "rename work key");
            }
            if let Some(path) = &report.staging_dir {
                println!("{:<20} {}", "staging directory", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rendering_round_trips_the_report() {
        let mut report = RunReport::new(5, 2);
        report.uploaded = 2;
        report.work_key = Some("work-1".to_string());
        render_report(&report, OutputFormat::Json).expect("json renders");
        render_report(&report, OutputFormat::Table).expect("table renders");
    }
}
