use crate::annotator::paths::AnnotatorPaths;
use crate::annotator::provider::known_base_url;
use crate::annotator::resume::DEFAULT_WORD_OVERLAP_TOL;
use crate::annotator::rotor::{Credential, DEFAULT_COOLDOWN_SECS, MAX_COOLDOWN_SECS};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Approximate characters sent per request.
    pub chunk_chars: usize,
    /// Requests per run; 0 runs until end of file.
    pub request_count: u64,
    pub temperature: f64,
    pub added_resend_tol: usize,
    pub removed_resend_tol: usize,
    pub word_overlap_tol: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1000,
            request_count: 0,
            temperature: 0.4,
            added_resend_tol: 15,
            removed_resend_tol: 15,
            word_overlap_tol: DEFAULT_WORD_OVERLAP_TOL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_secs: u64,
    pub default_cooldown_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            default_cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    /// Name of an env var holding comma separated keys.
    #[serde(default)]
    pub keys_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnotatorConfig {
    pub pipeline: PipelineConfig,
    pub client: ClientConfig,
    pub output: OutputConfig,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAnnotatorConfig {
    pipeline: Option<PipelineConfig>,
    client: Option<ClientConfig>,
    output: Option<OutputConfig>,
    providers: Option<Vec<ProviderConfig>>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn validate(cfg: &AnnotatorConfig) -> Result<()> {
    let p = &cfg.pipeline;
    if p.chunk_chars == 0 {
        return Err(anyhow!("invalid pipeline chunk_chars: must be >= 1"));
    }
    if p.word_overlap_tol == 0 {
        return Err(anyhow!("invalid pipeline word_overlap_tol: must be >= 1"));
    }
    if !(0.0..=2.0).contains(&p.temperature) {
        return Err(anyhow!("invalid pipeline temperature: require 0 <= temperature <= 2"));
    }
    if cfg.client.request_timeout_secs == 0 {
        return Err(anyhow!("invalid client request_timeout_secs: must be >= 1"));
    }
    if cfg.client.default_cooldown_secs > MAX_COOLDOWN_SECS {
        return Err(anyhow!(
            "invalid client default_cooldown_secs: must be <= {MAX_COOLDOWN_SECS}"
        ));
    }
    for provider in &cfg.providers {
        if provider.provider.trim().is_empty() {
            return Err(anyhow!("invalid provider entry: `provider` cannot be empty"));
        }
    }
    Ok(())
}

fn merge_partial(base: &mut AnnotatorConfig, parsed: PartialAnnotatorConfig) {
    if let Some(pipeline) = parsed.pipeline {
        base.pipeline = pipeline;
    }
    if let Some(client) = parsed.client {
        base.client = client;
    }
    if let Some(output) = parsed.output {
        base.output = output;
    }
    if let Some(providers) = parsed.providers {
        base.providers = providers;
    }
}

fn merge_file_config(base: &mut AnnotatorConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read annotator config {}: {err}", path.display()))?;
    let parsed: PartialAnnotatorConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse annotator config {}: {err}", path.display()))?;
    merge_partial(base, parsed);
    Ok(())
}

fn merge_env(cfg: &mut AnnotatorConfig) {
    let p = &mut cfg.pipeline;
    p.chunk_chars = env_or_usize("ANNOTATOR_CHUNK_CHARS", p.chunk_chars);
    p.request_count = env_or_u64("ANNOTATOR_REQUEST_COUNT", p.request_count);
    p.temperature = env_or_f64("ANNOTATOR_TEMPERATURE", p.temperature);
    p.added_resend_tol = env_or_usize("ANNOTATOR_ADDED_RESEND_TOL", p.added_resend_tol);
    p.removed_resend_tol = env_or_usize("ANNOTATOR_REMOVED_RESEND_TOL", p.removed_resend_tol);
    p.word_overlap_tol = env_or_usize("ANNOTATOR_WORD_OVERLAP_TOL", p.word_overlap_tol);

    let c = &mut cfg.client;
    c.request_timeout_secs = env_or_u64("ANNOTATOR_REQUEST_TIMEOUT_SECS", c.request_timeout_secs);
    c.default_cooldown_secs = env_or_u64("ANNOTATOR_COOLDOWN_SECS", c.default_cooldown_secs);

    if let Ok(dir) = env::var("ANNOTATOR_OUTPUT_DIR")
        && !dir.trim().is_empty()
    {
        cfg.output.dir = Some(dir.trim().to_string());
    }

    let keys = split_csv(&env_or_string("ANNOTATOR_API_KEYS", ""));
    if !keys.is_empty() {
        let base_url = env_or_string("ANNOTATOR_BASE_URL", "");
        cfg.providers.push(ProviderConfig {
            provider: env_or_string("ANNOTATOR_PROVIDER", "custom"),
            model: env_or_string("ANNOTATOR_MODEL", ""),
            base_url: (!base_url.is_empty()).then_some(base_url),
            keys,
            keys_env: None,
        });
    }
}

/// Explicit path, else `ANNOTATOR_CONFIG_PATH`, else the default under the
/// annotator home.
pub fn resolve_config_path(paths: &AnnotatorPaths, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file.clone())
}

pub fn load_config(paths: &AnnotatorPaths, explicit: Option<&Path>) -> Result<AnnotatorConfig> {
    let mut cfg = AnnotatorConfig::default();
    let path = resolve_config_path(paths, explicit);
    if explicit.is_some() && !path.exists() {
        return Err(anyhow!("annotator config not found: {}", path.display()));
    }
    merge_file_config(&mut cfg, &path)?;
    merge_env(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

impl AnnotatorConfig {
    pub fn output_dir(&self, paths: &AnnotatorPaths) -> PathBuf {
        match &self.output.dir {
            Some(dir) if !dir.trim().is_empty() => expand_home(dir.trim()),
            _ => paths.output_dir.clone(),
        }
    }

    /// Expands providers into one credential per key.
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        self.credentials_with(|var| env::var(var).ok())
    }

    fn credentials_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<Credential>> {
        let mut out = Vec::new();
        for entry in &self.providers {
            let name = entry.provider.trim();
            let base_url = entry
                .base_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .or_else(|| known_base_url(name))
                .ok_or_else(|| {
                    anyhow!("provider `{name}` has no base_url and is not a known provider")
                })?;
            if entry.model.trim().is_empty() {
                return Err(anyhow!("provider `{name}` has no model"));
            }

            let mut keys = entry
                .keys
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>();
            if let Some(var) = &entry.keys_env
                && let Some(raw) = lookup(var)
            {
                keys.extend(split_csv(&raw));
            }
            if keys.is_empty() {
                return Err(anyhow!("provider `{name}` has no API keys"));
            }

            out.extend(keys.into_iter().map(|key| Credential {
                provider: name.to_string(),
                model: entry.model.trim().to_string(),
                base_url: base_url.to_string(),
                key,
            }));
        }
        Ok(out)
    }
}
