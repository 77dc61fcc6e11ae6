//! Duplicate scan orchestration.
//!
//! The pure entry points [`find_duplicates`] and [`find_duplicates_of`]
//! validate parameters and run the grouping engine over in-memory records.
//! [`scan_library`] and [`check_library`] add record retrieval from a
//! [`RecordSource`] and progress reporting on top.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::group::{grouping_for, match_target};
use crate::models::*;
use crate::source::{RecordSource, SourceError};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Full-scan mode: group all `records` under `params`.
///
/// Parameters are validated before any work starts. An empty record set
/// yields an empty result.
pub fn find_duplicates(
    records: &[Record],
    params: &ScanParams,
) -> Result<Vec<DuplicateGroup>, ParamError> {
    params.validate()?;

    let grouping = grouping_for(params.strategy, params.threshold);
    Ok(grouping.group(records, params.max_groups))
}

/// Targeted mode: every record similar to the record with `focal_id`.
///
/// A focal id missing from `records` is reported as
/// [`TargetedMatch::FocalNotFound`], never as an empty match list.
pub fn find_duplicates_of(
    focal_id: u64,
    records: &[Record],
    params: &TargetParams,
) -> Result<TargetedMatch, ParamError> {
    params.validate()?;

    let Some(focal) = records.iter().find(|r| r.id == focal_id) else {
        return Ok(TargetedMatch::FocalNotFound { id: focal_id });
    };

    let matches = match_target(focal, records, params);
    Ok(TargetedMatch::Found {
        focal: focal.clone(),
        matches,
    })
}

/// Load every record from `source` and scan it for duplicate groups.
pub fn scan_library(
    source: &dyn RecordSource,
    params: &ScanParams,
    show_progress: bool,
) -> Result<ScanReport, ScanError> {
    params.validate()?;

    let records = load_records(source, show_progress)?;

    if show_progress {
        eprintln!(
            "Grouping {} records (strategy: {}, threshold: {:.2}, max groups: {})...",
            records.len(),
            params.strategy,
            params.threshold,
            params.max_groups
        );
    }
    let groups = find_duplicates(&records, params)?;

    info!(
        source = %source.describe(),
        records = records.len(),
        groups = groups.len(),
        strategy = %params.strategy,
        "duplicate scan complete"
    );

    Ok(ScanReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        parameters: params.clone(),
        record_count: records.len(),
        group_count: groups.len(),
        groups,
    })
}

/// Resolve `focal_id` in `source` and look for its duplicates.
///
/// The focal record is looked up on its own first so a missing id is
/// reported without loading the whole library.
pub fn check_library(
    source: &dyn RecordSource,
    focal_id: u64,
    params: &TargetParams,
    show_progress: bool,
) -> Result<TargetReport, ScanError> {
    params.validate()?;

    let report = |record_count, result| TargetReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        parameters: params.clone(),
        record_count,
        result,
    };

    if source.fetch_record_by_id(focal_id)?.is_none() {
        info!(source = %source.describe(), focal = focal_id, "focal record not found");
        return Ok(report(0, TargetedMatch::FocalNotFound { id: focal_id }));
    }

    let records = load_records(source, show_progress)?;
    let result = find_duplicates_of(focal_id, &records, params)?;

    info!(
        source = %source.describe(),
        focal = focal_id,
        matches = result.matches().len(),
        "targeted duplicate check complete"
    );

    Ok(report(records.len(), result))
}

fn load_records(source: &dyn RecordSource, show_progress: bool) -> Result<Vec<Record>, SourceError> {
    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading records from {}...", source.describe()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let records = source.fetch_all_records()?;

    if let Some(pb) = spinner {
        pb.finish_with_message(format!("Loaded {} records", records.len()));
    }

    Ok(records)
}
