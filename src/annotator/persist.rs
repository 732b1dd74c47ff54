use crate::annotator::category::Category;
use crate::annotator::paths::JobPaths;
use crate::annotator::segment::{Segment, merge_null_category_sections};
use crate::error::{AnnotatorError, PersistError};
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Last committed byte offset, or 0 when the job has not started or the
/// cursor file does not hold a number.
pub fn read_cursor(job: &JobPaths) -> Result<u64> {
    if !job.cursor_file.exists() {
        return Ok(0);
    }
    let raw = fs::read_to_string(&job.cursor_file)
        .with_context(|| format!("failed to read {}", job.cursor_file.display()))?;
    Ok(raw
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<u64>().ok())
        .unwrap_or(0))
}

pub fn write_cursor(job: &JobPaths, position: u64) -> Result<()> {
    job.ensure_dirs()?;
    fs::write(&job.cursor_file, position.to_string())
        .with_context(|| format!("failed to write {}", job.cursor_file.display()))
}

/// Reads a JSON segment array. A missing or blank file is an empty log.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Segment>>(&raw)
        .map_err(|_| PersistError::MalformedLog(path.to_path_buf()).into())
}

/// Replaces `path` with the pretty-printed segment array in one rename.
pub fn write_segments(path: &Path, segments: &[Segment]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let body = serde_json::to_string_pretty(segments)?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(body.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Appends segments to the job's output log, merging uncategorised runs that
/// meet at the boundary.
pub fn append_segments(job: &JobPaths, segments: &[Segment]) -> Result<()> {
    if segments.is_empty() {
        return Ok(());
    }
    let existing = load_segments(&job.main_output)?;
    let combined = merge_null_category_sections(
        existing.into_iter().chain(segments.iter().cloned()).collect(),
    );
    write_segments(&job.main_output, &combined)
}

/// Appends one line per categorised segment to `<dir>/<code>.txt`.
pub fn append_category_dumps(dir: &Path, segments: &[Segment]) -> Result<()> {
    let mut grouped: Vec<(Category, Vec<String>)> = Vec::new();
    for segment in segments {
        let Some(category) = segment.category else {
            continue;
        };
        match grouped.iter_mut().find(|(c, _)| *c == category) {
            Some((_, lines)) => lines.push(segment.joined()),
            None => grouped.push((category, vec![segment.joined()])),
        }
    }
    if grouped.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for (category, lines) in grouped {
        let path = dir.join(format!("{}.txt", category.code()));
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(format!("{}\n", lines.join("\n")).as_bytes())?;
    }
    Ok(())
}

pub fn append_change_log(job: &JobPaths, entry: &str) -> Result<()> {
    job.ensure_dirs()?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&job.changes_log)
        .with_context(|| format!("failed to open {}", job.changes_log.display()))?;
    file.write_all(format!("{entry}\n").as_bytes())?;
    Ok(())
}

/// Exclusive hold on a job directory for the lifetime of one run.
#[derive(Debug)]
pub struct JobLock {
    file: fs::File,
}

impl JobLock {
    pub fn acquire(job: &JobPaths) -> Result<Self> {
        job.ensure_dirs()?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&job.lock_file)
            .with_context(|| format!("failed to open {}", job.lock_file.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(AnnotatorError::Locked(job.job_dir.clone()).into());
        }
        Ok(Self { file })
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Header line of a change log entry.
pub fn position_header(from: u64, to: u64) -> String {
    format!("----- {from:16} - {to:16} -----")
}

#[cfg(test)]
mod tests {
    use super::{
        JobLock, append_category_dumps, append_change_log, append_segments, load_segments,
        position_header, read_cursor, write_cursor,
    };
    use crate::annotator::category::Category;
    use crate::annotator::paths::JobPaths;
    use crate::annotator::segment::Segment;
    use crate::error::{AnnotatorError, PersistError};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn job() -> (TempDir, JobPaths) {
        let tmp = tempdir().expect("tempdir");
        let job = JobPaths::for_input(tmp.path(), tmp.path().join("doc.txt").as_path())
            .expect("job paths");
        (tmp, job)
    }

    #[test]
    fn cursor_defaults_to_zero() {
        let (_tmp, job) = job();
        assert_eq!(read_cursor(&job).expect("read"), 0);
        write_cursor(&job, 4096).expect("write");
        assert_eq!(read_cursor(&job).expect("read"), 4096);
        fs::write(&job.cursor_file, "garbage").expect("overwrite");
        assert_eq!(read_cursor(&job).expect("read"), 0);
    }

    #[test]
    fn append_merges_plain_runs_at_boundary() {
        let (_tmp, job) = job();
        append_segments(
            &job,
            &[
                Segment::tagged(Category::PersonalName, ["Jan"]),
                Segment::plain(["řekl"]),
            ],
        )
        .expect("first append");
        append_segments(
            &job,
            &[
                Segment::plain(["že"]),
                Segment::tagged(Category::Location, ["Brno"]),
            ],
        )
        .expect("second append");

        let stored = load_segments(&job.main_output).expect("load");
        assert_eq!(
            stored,
            vec![
                Segment::tagged(Category::PersonalName, ["Jan"]),
                Segment::plain(["řekl", "že"]),
                Segment::tagged(Category::Location, ["Brno"]),
            ]
        );
        let raw = fs::read_to_string(&job.main_output).expect("raw");
        assert!(raw.contains("\"řekl\""));
        assert!(raw.contains("\"category\": null"));
    }

    #[test]
    fn malformed_log_is_left_untouched() {
        let (_tmp, job) = job();
        job.ensure_dirs().expect("dirs");
        fs::write(&job.main_output, "{\"not\": \"an array\"}").expect("seed");

        let err = append_segments(&job, &[Segment::plain(["x"])]).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<PersistError>(),
            Some(PersistError::MalformedLog(_))
        ));
        assert_eq!(
            fs::read_to_string(&job.main_output).expect("raw"),
            "{\"not\": \"an array\"}"
        );
    }

    #[test]
    fn category_dumps_append_one_line_per_segment() {
        let (_tmp, job) = job();
        let segments = vec![
            Segment::tagged(Category::PersonalName, ["Jan", "Novák"]),
            Segment::plain(["a"]),
            Segment::tagged(Category::Email, ["jan@x.cz"]),
            Segment::tagged(Category::PersonalName, ["Eva"]),
        ];
        append_category_dumps(&job.category_dir, &segments).expect("first");
        append_category_dumps(&job.category_dir, &segments[3..]).expect("second");

        let names = fs::read_to_string(job.category_file(Category::PersonalName)).expect("pn");
        assert_eq!(names, "Jan Novák\nEva\nEva\n");
        let emails = fs::read_to_string(job.category_file(Category::Email)).expect("e");
        assert_eq!(emails, "jan@x.cz\n");
    }

    #[test]
    fn change_log_entries_are_appended() {
        let (_tmp, job) = job();
        let entry = format!("{}\n  0   added: \n  0 removed: ", position_header(0, 812));
        append_change_log(&job, &entry).expect("append");
        let raw = fs::read_to_string(&job.changes_log).expect("read");
        assert!(raw.starts_with("-----                0 -              812 -----\n"));
    }

    #[test]
    fn second_lock_on_same_job_is_refused() {
        let (_tmp, job) = job();
        let held = JobLock::acquire(&job).expect("first lock");
        let err = JobLock::acquire(&job).expect_err("already locked");
        assert!(matches!(
            err.downcast_ref::<AnnotatorError>(),
            Some(AnnotatorError::Locked(_))
        ));
        drop(held);
        JobLock::acquire(&job).expect("lock after release");
    }
}
