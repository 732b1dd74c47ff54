use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::annotator::category::Category;
use crate::annotator::config::{load_config, resolve_config_path};
use crate::annotator::paths::{JobPaths, resolve_paths};
use crate::annotator::persist::{load_segments, read_cursor};
use crate::commands::CommandReport;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/annotator_env_allowlist.rs"));
}

#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

const ENV_PREFIX: &str = "ANNOTATOR_";

fn unknown_env_keys(
    keys: impl Iterator<Item = String>,
    prefix: &str,
    allowlist: &[&str],
) -> Vec<String> {
    let mut out = keys
        .filter(|key| key.starts_with(prefix))
        .filter(|key| !allowlist.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}

fn progress_percent(cursor: u64, size: u64) -> f64 {
    if size == 0 {
        return 100.0;
    }
    (cursor.min(size) as f64 / size as f64) * 100.0
}

pub fn run(opts: &StatusOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_id={}", env!("BUILD_ID")));
    report.detail(format!("home={}", paths.annotator_home.display()));
    report.detail(format!(
        "config={}",
        resolve_config_path(&paths, opts.config.as_deref()).display()
    ));
    let cfg = load_config(&paths, opts.config.as_deref())?;
    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.output_dir(&paths));
    let job = JobPaths::for_input(&output_dir, &opts.input)?;
    report.detail(format!("job_dir={}", job.job_dir.display()));

    let cursor = read_cursor(&job)?;
    report.detail(format!("cursor={cursor}"));
    match fs::metadata(&opts.input) {
        Ok(meta) => {
            report.detail(format!("input_bytes={}", meta.len()));
            report.detail(format!(
                "progress={:.1}%",
                progress_percent(cursor, meta.len())
            ));
        }
        Err(_) => report.issue(format!("input file not found: {}", opts.input.display())),
    }

    match load_segments(&job.main_output)
        .with_context(|| format!("failed to load {}", job.main_output.display()))
    {
        Ok(segments) => {
            let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
            let mut plain_words = 0usize;
            for segment in &segments {
                match segment.category {
                    Some(category) => *counts.entry(category).or_default() += 1,
                    None => plain_words += segment.words.len(),
                }
            }
            report.detail(format!("segments={}", segments.len()));
            report.detail(format!("plain_words={plain_words}"));
            for (category, count) in counts {
                report.detail(format!("category.{}={count}", category.code()));
            }
        }
        Err(err) => report.issue(format!("{err:#}")),
    }

    match cfg.credentials() {
        Ok(credentials) if credentials.is_empty() => {
            report.detail("providers=none");
        }
        Ok(credentials) => {
            for credential in credentials {
                report.detail(format!("provider={}", credential.label()));
            }
        }
        Err(err) => report.issue(format!("provider config: {err:#}")),
    }

    let unknown = unknown_env_keys(
        env::vars().map(|(k, _)| k),
        ENV_PREFIX,
        generated::GENERATED_ENV_ALLOWLIST,
    );
    if !unknown.is_empty() {
        report.detail(format!("unknown_env={}", unknown.join(",")));
    }

    Ok(report)
}
