use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::annotator::cleaner::clean;
use crate::annotator::persist::{append_category_dumps, write_segments};
use crate::annotator::segment::word_count;
use crate::annotator::tag_parser::{parse, strip_reasoning};
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub dumps_dir: Option<PathBuf>,
}

/// Parses hand-tagged text into the same JSON segment array the pipeline
/// writes.
pub fn run(opts: &ConvertOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("convert");

    if !opts.input.is_file() {
        report.issue(format!("input file not found: {}", opts.input.display()));
        return Ok(report);
    }
    let raw = fs::read_to_string(&opts.input)
        .with_context(|| format!("failed to read {}", opts.input.display()))?;

    let segments = clean(parse(&strip_reasoning(&raw)));
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| opts.input.with_extension("json"));
    write_segments(&output, &segments)?;

    report.detail(format!("output={}", output.display()));
    report.detail(format!("segments={}", segments.len()));
    report.detail(format!(
        "tagged_segments={}",
        segments.iter().filter(|s| !s.is_plain()).count()
    ));
    report.detail(format!("words={}", word_count(&segments)));

    if let Some(dir) = &opts.dumps_dir {
        append_category_dumps(dir, &segments)?;
        report.detail(format!("dumps_dir={}", dir.display()));
    }

    Ok(report)
}
