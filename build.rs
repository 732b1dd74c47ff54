use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

const ENV_PREFIX: &str = "ANNOTATOR_";

/// Every `ANNOTATOR_*` name spelled out in `source`.
fn env_names(source: &str) -> impl Iterator<Item = &str> {
    source.match_indices(ENV_PREFIX).filter_map(|(start, _)| {
        let tail = &source[start + ENV_PREFIX.len()..];
        let len = tail
            .find(|ch: char| !(ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_'))
            .unwrap_or(tail.len());
        (len > 0).then(|| &source[start..start + ENV_PREFIX.len() + len])
    })
}

fn scan_dir(dir: &Path, names: &mut BTreeSet<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, names)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            let source = fs::read_to_string(&path)?;
            names.extend(env_names(&source).map(str::to_string));
        }
    }
    Ok(())
}

fn main() -> std::io::Result<()> {
    let mut names = BTreeSet::new();
    scan_dir(Path::new("src"), &mut names)?;

    let entries = names
        .iter()
        .map(|name| format!("    {name:?},\n"))
        .collect::<String>();
    let out_dir = env::var("OUT_DIR").map_err(std::io::Error::other)?;
    fs::write(
        Path::new(&out_dir).join("annotator_env_allowlist.rs"),
        format!("pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[\n{entries}];\n"),
    )?;

    let stamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(std::io::Error::other)?;
    println!(
        "cargo:rustc-env=BUILD_ID={:x}-{:x}",
        stamp.as_secs(),
        stamp.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}
