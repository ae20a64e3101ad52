//! Rendering of a finished [`Report`].

use std::fmt::Write as _;
use std::time::Duration;

use crate::config::ParamsConfig;
use crate::format::{byte_count_iec, byte_count_si, format_execution_time};
use crate::types::{Report, SizeEntry, UsageStatus};

pub trait ReportRenderer {
    fn render(&self, report: &Report) -> anyhow::Result<String>;
}

/// Plain-text report, the form mailed or written to disk.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    pub date_format: String,
    pub time_format: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { date_format: "%Y-%m-%d".to_string(), time_format: "%H:%M:%S".to_string() }
    }
}

impl From<&ParamsConfig> for TextRenderer {
    fn from(params: &ParamsConfig) -> Self {
        Self { date_format: params.date_format.clone(), time_format: params.time_format.clone() }
    }
}

impl TextRenderer {
    fn write_entry(out: &mut String, entry: &SizeEntry, indent: usize) -> std::fmt::Result {
        let pad = "  ".repeat(indent);
        match &entry.error {
            Some(err) => writeln!(out, "{}{} {} [error: {}]", pad, entry.name, entry.size, err),
            None => writeln!(out, "{}{} {}", pad, entry.name, entry.size),
        }
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &Report) -> anyhow::Result<String> {
        let mut out = String::new();
        writeln!(
            out,
            "Storage inventory started {} at {}",
            report.started_at.format(&self.date_format),
            report.started_at.format(&self.time_format)
        )?;
        writeln!(out)?;

        writeln!(out, "Volumes")?;
        for usage in &report.usages {
            match (&usage.status, usage.percent_used) {
                (UsageStatus::Error(reason), _) => {
                    writeln!(out, "  {}: unavailable - {}", usage.display_name, reason)?;
                }
                (_, Some(pct)) => {
                    write!(out, "  {}: {:.2} % - {}", usage.display_name, pct, usage.message)?;
                    if let Some(cap) = usage.capacity {
                        write!(
                            out,
                            " ({} of {} used, {} available)",
                            byte_count_iec(cap.used()),
                            byte_count_iec(cap.total),
                            byte_count_iec(cap.available)
                        )?;
                    }
                    writeln!(out)?;
                }
                (_, None) => writeln!(out, "  {}: {}", usage.display_name, usage.message)?,
            }
        }

        for inventory in &report.inventories {
            writeln!(out)?;
            writeln!(out, "Folders on {}", inventory.folder_root)?;
            if inventory.entries.is_empty() {
                writeln!(out, "  (no folders configured)")?;
            }
            for entry in inventory.entries.iter() {
                Self::write_entry(&mut out, entry, 1)?;
                for child in &entry.children {
                    Self::write_entry(&mut out, child, 2)?;
                }
            }
        }

        writeln!(out)?;
        writeln!(
            out,
            "Finished {} at {} (execution time {})",
            report.finished_at.format(&self.date_format),
            report.finished_at.format(&self.time_format),
            format_execution_time(Duration::from_millis(report.elapsed_ms))
        )?;
        let stats = &report.stats;
        writeln!(
            out,
            "{} units, {} failed, {} files, {} scanned, {} unreadable entries skipped",
            stats.units_dispatched,
            stats.units_failed,
            stats.files_scanned,
            byte_count_si(stats.bytes_scanned),
            stats.warnings_count
        )?;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, report: &Report) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}
