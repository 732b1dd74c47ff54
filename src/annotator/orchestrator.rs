use crate::annotator::audit;
use crate::annotator::change_detector::{ChangeSet, diff};
use crate::annotator::chunk_reader::{Chunk, read_chunk};
use crate::annotator::cleaner::clean;
use crate::annotator::config::PipelineConfig;
use crate::annotator::paths::JobPaths;
use crate::annotator::persist;
use crate::annotator::prompt::build_messages;
use crate::annotator::resume::correct_and_reverse_index;
use crate::annotator::rotor::ChatClient;
use crate::annotator::segment::{Segment, word_count};
use crate::annotator::tag_parser::{parse, reconstruct, strip_reasoning};
use crate::annotator::warn::{self, WarnEvent};
use anyhow::{Context, Result};

/// Words committed uncategorised when a drifted chunk is retried.
const RESEND_SKIP_WORDS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub start_position: u64,
    pub end_position: u64,
    pub requests: u64,
    pub chunks: u64,
    pub resends: u64,
    pub committed_words: usize,
    pub reached_eof: bool,
}

/// Drives read → request → parse → check → clean → trim → persist over one
/// input file, resuming from the job's cursor.
pub struct Orchestrator<C: ChatClient> {
    pipeline: PipelineConfig,
    client: C,
    job: JobPaths,
}

impl<C: ChatClient> Orchestrator<C> {
    pub fn new(pipeline: PipelineConfig, client: C, job: JobPaths) -> Self {
        Self {
            pipeline,
            client,
            job,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn request_limit_reached(&self, requests: u64) -> bool {
        self.pipeline.request_count > 0 && requests >= self.pipeline.request_count
    }

    fn drift_reason(&self, changes: &ChangeSet, empty_reply: bool) -> String {
        let mut parts = Vec::new();
        if empty_reply {
            parts.push("empty reply".to_string());
        }
        if changes.added.len() > self.pipeline.added_resend_tol {
            parts.push(format!(
                "added {} > {}",
                changes.added.len(),
                self.pipeline.added_resend_tol
            ));
        }
        if changes.removed.len() > self.pipeline.removed_resend_tol {
            parts.push(format!(
                "removed {} > {}",
                changes.removed.len(),
                self.pipeline.removed_resend_tol
            ));
        }
        parts.join(", ")
    }

    /// Commits the first words of a rejected chunk as plain text and returns
    /// the offset the retry starts from.
    fn skip_for_resend(&self, chunk: &Chunk, reason: &str) -> Result<(u64, usize)> {
        let skipped = chunk
            .text
            .split(' ')
            .filter(|w| !w.is_empty())
            .take(RESEND_SKIP_WORDS)
            .collect::<Vec<_>>();
        let next = chunk.offset_at(skipped.len().max(1) as isize - 1);

        persist::append_segments(&self.job, &[Segment::plain(skipped.iter().copied())])?;
        persist::write_cursor(&self.job, next)?;

        warn::emit(&WarnEvent {
            code: "DRIFT",
            stage: "resend",
            action: "retry",
            position: &next.to_string(),
            reason,
        });
        audit::append_event(
            &self.job.audit_log,
            "resend",
            "warn",
            &format!("{}..{} {reason}", chunk.start, chunk.end_offset()),
        )?;
        Ok((next, skipped.len()))
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.job.ensure_dirs()?;
        let start = persist::read_cursor(&self.job)?;
        let mut summary = RunSummary {
            start_position: start,
            end_position: start,
            ..RunSummary::default()
        };
        let mut position = start;
        let mut prev_position = start;

        while !self.request_limit_reached(summary.requests) {
            let chunk = read_chunk(&self.job.input, position, self.pipeline.chunk_chars)?;
            if chunk.is_empty() {
                summary.reached_eof = true;
                break;
            }
            summary.requests += 1;

            let reply = self
                .client
                .chat(&build_messages(&chunk.text), self.pipeline.temperature)
                .with_context(|| format!("completion request for chunk at {position} failed"))?;
            let parsed = parse(&strip_reasoning(&reply));
            let changes = diff(&chunk.text, &reconstruct(&parsed));
            let header = persist::position_header(prev_position, chunk.end_offset());

            // A reply with no words would silently drop the whole chunk.
            let empty_reply = parsed.is_empty();
            if empty_reply
                || changes.exceeds(
                    self.pipeline.added_resend_tol,
                    self.pipeline.removed_resend_tol,
                )
            {
                let reason = self.drift_reason(&changes, empty_reply);
                let (next, skipped) = self.skip_for_resend(&chunk, &reason)?;
                summary.resends += 1;
                summary.committed_words += skipped;
                position = next;
                prev_position = next;
                summary.end_position = next;
                continue;
            }

            persist::append_change_log(
                &self.job,
                &format!("{header}\n{}", changes.to_log_string()),
            )?;

            let cleaned = clean(parsed);
            let (segments, next, withheld) = if chunk.at_eof {
                (cleaned, chunk.end_offset(), 0)
            } else {
                let trim = correct_and_reverse_index(
                    cleaned,
                    &chunk.text,
                    self.pipeline.word_overlap_tol,
                );
                let next = chunk.offset_at(trim.reverse_index());
                (trim.segments, next, trim.removed_words)
            };

            persist::append_segments(&self.job, &segments)?;
            persist::append_category_dumps(&self.job.category_dir, &segments)?;
            persist::write_cursor(&self.job, next)?;

            let words = word_count(&segments);
            warn::progress(
                "chunk",
                &[
                    ("from", chunk.start.to_string()),
                    ("to", next.to_string()),
                    ("words", words.to_string()),
                    ("withheld", withheld.to_string()),
                    ("added", changes.added.len().to_string()),
                    ("removed", changes.removed.len().to_string()),
                ],
            );
            audit::append_event(
                &self.job.audit_log,
                "chunk",
                "ok",
                &format!("{}..{} words={words}", chunk.start, next),
            )?;

            summary.chunks += 1;
            summary.committed_words += words;
            summary.end_position = next;
            position = next;
            prev_position = next;
        }

        audit::append_event(
            &self.job.audit_log,
            "finish",
            "ok",
            &format!(
                "cursor={} chunks={} resends={} eof={}",
                summary.end_position, summary.chunks, summary.resends, summary.reached_eof
            ),
        )?;
        Ok(summary)
    }
}
