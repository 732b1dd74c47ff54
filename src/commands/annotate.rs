use anyhow::Result;
use std::path::PathBuf;

use crate::annotator::config::load_config;
use crate::annotator::orchestrator::Orchestrator;
use crate::annotator::paths::{JobPaths, resolve_paths};
use crate::annotator::persist::JobLock;
use crate::annotator::provider::OpenAiCompatBackend;
use crate::annotator::rotor::CredentialRotor;
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub requests: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

pub fn run(opts: &AnnotateOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("annotate");

    if !opts.input.is_file() {
        report.issue(format!("input file not found: {}", opts.input.display()));
        return Ok(report);
    }

    let mut cfg = load_config(&paths, opts.config.as_deref())?;
    if let Some(requests) = opts.requests {
        cfg.pipeline.request_count = requests;
    }
    let output_dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.output_dir(&paths));
    let job = JobPaths::for_input(&output_dir, &opts.input)?;

    let credentials = cfg.credentials()?;
    if credentials.is_empty() {
        report.issue(
            "no providers configured; add [[providers]] to the config or set ANNOTATOR_API_KEYS",
        );
        return Ok(report);
    }

    let _lock = JobLock::acquire(&job)?;
    let backend = OpenAiCompatBackend::new(cfg.client.request_timeout())?;
    let rotor = CredentialRotor::new(backend, credentials, cfg.client.default_cooldown())
        .with_audit_log(job.audit_log.clone());

    report.detail(format!("input={}", opts.input.display()));
    report.detail(format!("job_dir={}", job.job_dir.display()));
    report.detail(format!("credentials={}", rotor.active_labels().join(",")));

    let mut orchestrator = Orchestrator::new(cfg.pipeline.clone(), rotor, job.clone());
    let outcome = orchestrator.run();
    report.detail(format!(
        "cooling_credentials={}",
        orchestrator.client().cooling_count()
    ));
    match outcome {
        Ok(summary) => {
            report.detail(format!(
                "cursor={}..{}",
                summary.start_position, summary.end_position
            ));
            report.detail(format!("requests={}", summary.requests));
            report.detail(format!("chunks={}", summary.chunks));
            report.detail(format!("resends={}", summary.resends));
            report.detail(format!("committed_words={}", summary.committed_words));
            report.detail(format!("reached_eof={}", summary.reached_eof));
            report.detail(format!("main_output={}", job.main_output.display()));
        }
        Err(err) => {
            report.issue(format!("annotation stopped: {err:#}"));
            report.detail("progress up to the last committed chunk is kept; rerun to resume");
        }
    }

    Ok(report)
}
