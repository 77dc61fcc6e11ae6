//! Output formatting for scan results (text, JSON, CSV, Markdown).

use crate::identifiers::parse_identifiers;
use crate::models::{DuplicateGroup, Record, ScanReport, TargetReport, TargetedMatch};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a scan report as JSON.
pub fn write_json<W: Write>(report: &ScanReport, writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write a scan report as JSON to a file.
pub fn write_json_file(report: &ScanReport, path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(report, &mut file)
}

/// Write a targeted report as JSON.
pub fn write_target_json<W: Write>(report: &TargetReport, writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write groups as CSV, one row per group member.
pub fn write_csv<W: Write>(groups: &[DuplicateGroup], writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "group,reason,id,title,authors,identifiers,formats")?;

    for (idx, group) in groups.iter().enumerate() {
        for record in &group.members {
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                idx + 1,
                csv_field(&group.reason),
                record.id,
                csv_field(&record.title),
                csv_field(&record.authors),
                csv_field(record.identifiers.as_deref().unwrap_or("")),
                csv_field(record.formats.as_deref().unwrap_or("")),
            )?;
        }
    }

    Ok(())
}

/// Write matched records of a targeted report as CSV.
pub fn write_target_csv<W: Write>(report: &TargetReport, writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "focal_id,id,title,authors,identifiers,formats")?;

    if let TargetedMatch::Found { focal, matches } = &report.result {
        for record in matches {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                focal.id,
                record.id,
                csv_field(&record.title),
                csv_field(&record.authors),
                csv_field(record.identifiers.as_deref().unwrap_or("")),
                csv_field(record.formats.as_deref().unwrap_or("")),
            )?;
        }
    }

    Ok(())
}

/// Quote a CSV field, doubling inner quotes.
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render a scan report as Markdown.
pub fn render_markdown(report: &ScanReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Duplicate Books\n");
    let _ = writeln!(
        out,
        "Found **{}** duplicate group(s) among {} books (strategy: `{}`{}).\n",
        report.group_count,
        report.record_count,
        report.parameters.strategy,
        if report.parameters.strategy.uses_threshold() {
            format!(", threshold: {:.2}", report.parameters.threshold)
        } else {
            String::new()
        }
    );

    for (idx, group) in report.groups.iter().enumerate() {
        let _ = writeln!(out, "## Group {}: {}\n", idx + 1, group.reason);
        for record in &group.members {
            let _ = writeln!(out, "{}", markdown_record(record));
        }
        out.push('\n');
    }

    out
}

/// Render a targeted report as Markdown.
pub fn render_target_markdown(report: &TargetReport) -> String {
    let mut out = String::new();

    match &report.result {
        TargetedMatch::FocalNotFound { id } => {
            let _ = writeln!(out, "Book {} not found.", id);
        }
        TargetedMatch::Found { focal, matches } => {
            let _ = writeln!(out, "# Possible duplicates of \"{}\" (ID: {})\n", focal.title, focal.id);
            if matches.is_empty() {
                let _ = writeln!(out, "No duplicates found.");
            } else {
                for record in matches {
                    let _ = writeln!(out, "{}", markdown_record(record));
                }
            }
        }
    }

    out
}

fn markdown_record(record: &Record) -> String {
    let mut line = format!(
        "- **{}** by {} (ID: {})",
        record.title,
        if record.authors.is_empty() {
            "Unknown"
        } else {
            record.authors.as_str()
        },
        record.id
    );
    let formats = record.format_list();
    if !formats.is_empty() {
        let _ = write!(line, "\n  - Formats: {}", formats.join(", "));
    }
    line
}

/// Write a scan summary.
pub fn write_summary<W: Write>(report: &ScanReport, writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "\n=== Duplicate Scan Summary ===")?;
    writeln!(writer, "Version: {}", report.version)?;
    writeln!(writer)?;
    writeln!(writer, "Parameters:")?;
    writeln!(writer, "  Strategy: {}", report.parameters.strategy)?;
    if report.parameters.strategy.uses_threshold() {
        writeln!(writer, "  Threshold: {:.1}%", report.parameters.threshold * 100.0)?;
    }
    writeln!(writer, "  Max groups: {}", report.parameters.max_groups)?;
    writeln!(writer)?;
    writeln!(writer, "Results:")?;
    writeln!(writer, "  Records scanned: {}", report.record_count)?;
    writeln!(writer, "  Groups found: {}", report.group_count)?;
    writeln!(
        writer,
        "  Records in groups: {}",
        report.groups.iter().map(|g| g.len()).sum::<usize>()
    )?;
    Ok(())
}

/// Write a scan summary to stdout.
pub fn print_summary(report: &ScanReport) {
    let _ = write_summary(report, &mut io::stdout().lock());
}

/// Format a record as a single human-readable line.
pub fn format_record(record: &Record) -> String {
    format!(
        "[{}] {} by {}",
        record.id,
        truncate_text(&record.title, 80),
        if record.authors.is_empty() {
            "(unknown author)"
        } else {
            record.authors.as_str()
        }
    )
}

/// Format a group as a human-readable block.
pub fn format_group(number: usize, group: &DuplicateGroup) -> String {
    let mut out = format!("Group {} ({} books): {}", number, group.len(), group.reason);
    for record in &group.members {
        let _ = write!(out, "\n  {}", format_record(record));
    }
    out
}

/// Write groups in a human-readable format, at most `limit` of them.
pub fn write_groups<W: Write>(
    groups: &[DuplicateGroup],
    limit: Option<usize>,
    writer: &mut W,
) -> Result<(), OutputError> {
    let to_print = match limit {
        Some(n) => &groups[..n.min(groups.len())],
        None => groups,
    };

    for (idx, group) in to_print.iter().enumerate() {
        writeln!(writer, "{}", format_group(idx + 1, group))?;
    }

    if let Some(n) = limit {
        if groups.len() > n {
            writeln!(writer, "... and {} more groups", groups.len() - n)?;
        }
    }

    Ok(())
}

/// Print groups in a human-readable format.
pub fn print_groups(groups: &[DuplicateGroup], limit: Option<usize>) {
    let _ = write_groups(groups, limit, &mut io::stdout().lock());
}

/// Write a targeted report in a human-readable format.
pub fn write_target_report<W: Write>(
    report: &TargetReport,
    writer: &mut W,
) -> Result<(), OutputError> {
    match &report.result {
        TargetedMatch::FocalNotFound { id } => writeln!(writer, "Book {} not found", id)?,
        TargetedMatch::Found { focal, matches } => {
            writeln!(writer, "Focal: {}", format_record(focal))?;
            // Identifier matching only scores titles when the focal record has no identifiers
            let threshold_used = report.parameters.strategy.uses_threshold()
                || parse_identifiers(focal.identifiers.as_deref()).is_empty();
            if threshold_used {
                writeln!(
                    writer,
                    "Strategy: {}  Threshold: {:.1}%",
                    report.parameters.strategy,
                    report.parameters.threshold * 100.0
                )?;
            } else {
                writeln!(writer, "Strategy: {}", report.parameters.strategy)?;
            }
            if matches.is_empty() {
                writeln!(writer, "No duplicates found among {} records", report.record_count)?;
            } else {
                writeln!(writer, "{} possible duplicate(s):", matches.len())?;
                for record in matches {
                    writeln!(writer, "  {}", format_record(record))?;
                }
            }
        }
    }
    Ok(())
}

/// Print a targeted report to stdout.
pub fn print_target_report(report: &TargetReport) {
    let _ = write_target_report(report, &mut io::stdout().lock());
}

/// Truncate text to a maximum length, adding ellipsis if needed.
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
