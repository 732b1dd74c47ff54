use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::annotator::change_detector::{MAX_ALIGNMENT_CELLS, diff};
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub original: PathBuf,
    pub changed: PathBuf,
}

pub fn run(opts: &DiffOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("diff");

    let original = fs::read_to_string(&opts.original)
        .with_context(|| format!("failed to read {}", opts.original.display()))?;
    let changed = fs::read_to_string(&opts.changed)
        .with_context(|| format!("failed to read {}", opts.changed.display()))?;

    let cells = original
        .split_whitespace()
        .count()
        .saturating_mul(changed.split_whitespace().count());
    if cells > MAX_ALIGNMENT_CELLS {
        report.issue(format!(
            "inputs too large to align ({cells} cells > {MAX_ALIGNMENT_CELLS}); diff smaller files"
        ));
        return Ok(report);
    }

    let changes = diff(&original, &changed);
    if changes.is_clean() {
        report.detail("texts match word for word");
    }
    report.detail(format!("added={}", changes.added.len()));
    report.detail(format!("removed={}", changes.removed.len()));
    for line in changes.to_log_string().lines() {
        report.detail(line.to_string());
    }
    Ok(report)
}
