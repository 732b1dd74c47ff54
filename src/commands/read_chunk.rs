use anyhow::Result;
use std::path::PathBuf;

use crate::annotator::chunk_reader::read_chunk;
use crate::annotator::config::PipelineConfig;
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct ReadChunkOptions {
    pub input: PathBuf,
    pub position: u64,
    pub chars: Option<usize>,
}

pub fn run(opts: &ReadChunkOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("read-chunk");
    let chars = opts
        .chars
        .unwrap_or_else(|| PipelineConfig::default().chunk_chars);
    if chars == 0 {
        report.issue("--chars must be >= 1");
        return Ok(report);
    }

    let chunk = read_chunk(&opts.input, opts.position, chars)?;
    report.detail(format!("start={}", chunk.start));
    report.detail(format!("words={}", chunk.word_count()));
    report.detail(format!(
        "first_offset={}",
        chunk.word_end_offsets.first().copied().unwrap_or(chunk.start)
    ));
    report.detail(format!("end_offset={}", chunk.end_offset()));
    report.detail(format!("at_eof={}", chunk.at_eof));
    report.detail(format!("text={}", chunk.text));
    Ok(report)
}
