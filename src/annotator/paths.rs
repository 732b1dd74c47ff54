use crate::annotator::category::Category;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AnnotatorPaths {
    pub annotator_home: PathBuf,
    pub config_file: PathBuf,
    pub output_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<AnnotatorPaths> {
    let home = required_home_dir()?;
    let annotator_home = env_or_default_path("ANNOTATOR_HOME", home.join(".pii-annotator"));
    let config_file =
        env_or_default_path("ANNOTATOR_CONFIG_PATH", annotator_home.join("annotator.toml"));
    let output_dir = annotator_home.join("output");

    Ok(AnnotatorPaths {
        annotator_home,
        config_file,
        output_dir,
    })
}

/// Files belonging to one input document, all under
/// `<output_dir>/<input file name>/`.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub input: PathBuf,
    pub job_dir: PathBuf,
    pub main_output: PathBuf,
    pub changes_log: PathBuf,
    pub cursor_file: PathBuf,
    pub category_dir: PathBuf,
    pub audit_log: PathBuf,
    pub lock_file: PathBuf,
}

impl JobPaths {
    pub fn for_input(output_dir: &Path, input: &Path) -> Result<Self> {
        let name = input
            .file_name()
            .ok_or_else(|| anyhow!("input path has no file name: {}", input.display()))?;
        let job_dir = output_dir.join(name);
        Ok(Self {
            input: input.to_path_buf(),
            main_output: job_dir.join("main_output.txt"),
            changes_log: job_dir.join("changes.txt"),
            cursor_file: job_dir.join("latest_position.txt"),
            category_dir: job_dir.join("category_words"),
            audit_log: job_dir.join("audit.log"),
            lock_file: job_dir.join("job.lock"),
            job_dir,
        })
    }

    pub fn category_file(&self, category: Category) -> PathBuf {
        self.category_dir.join(format!("{}.txt", category.code()))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.job_dir)
            .with_context(|| format!("failed to create {}", self.job_dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::JobPaths;
    use crate::annotator::category::Category;
    use std::path::Path;

    #[test]
    fn job_files_live_under_input_file_name() {
        let job = JobPaths::for_input(Path::new("/out"), Path::new("/data/rozsudek.txt"))
            .expect("job paths");
        assert_eq!(job.job_dir, Path::new("/out/rozsudek.txt"));
        assert_eq!(job.cursor_file, Path::new("/out/rozsudek.txt/latest_position.txt"));
        assert_eq!(
            job.category_file(Category::PersonalName),
            Path::new("/out/rozsudek.txt/category_words/pn.txt")
        );
    }

    #[test]
    fn rejects_input_without_file_name() {
        assert!(JobPaths::for_input(Path::new("/out"), Path::new("/")).is_err());
    }
}
