use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_config(path: &Path, base_url: &str) {
    let config = format!(
        r#"
[client]
request_timeout_secs = 2

[[providers]]
provider = "custom"
model = "test-model"
base_url = "{base_url}"
keys = ["key-one", "key-two"]
"#
    );
    fs::write(path, config).expect("write config");
}

#[test]
fn annotate_fails_when_every_credential_cools_down() {
    let tmp = tempdir().expect("tempdir");
    let input = tmp.path().join("rozsudek.txt");
    fs::write(&input, "Ahoj já jsem Honza Novák a bydlím v Brně.\n").expect("write input");
    let config = tmp.path().join("annotator.toml");
    write_config(&config, "http://127.0.0.1:9/v1");
    let out = tmp.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("pii-annotator")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("ANNOTATOR_HOME", tmp.path().join("home"))
        .env_remove("ANNOTATOR_API_KEYS")
        .arg("annotate")
        .args(["--input", input.to_str().expect("utf8 path")])
        .args(["--config", config.to_str().expect("utf8 path")])
        .args(["--output-dir", out.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stdout(predicate::str::contains("annotate failed"))
        .stdout(predicate::str::contains("all 2 credentials"))
        .stderr(predicate::str::contains("ANNOTATOR_WARN code=COOLDOWN"))
        .stderr(predicate::str::contains("key-one").not());

    let job = out.join("rozsudek.txt");
    assert!(!job.join("main_output.txt").exists());
    assert!(!job.join("latest_position.txt").exists());
    let audit = fs::read_to_string(job.join("audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"cooldown\""));
}

#[test]
fn annotate_requires_a_provider() {
    let tmp = tempdir().expect("tempdir");
    let input = tmp.path().join("doc.txt");
    fs::write(&input, "text").expect("write input");

    assert_cmd::cargo::cargo_bin_cmd!("pii-annotator")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("ANNOTATOR_HOME", tmp.path().join("home"))
        .env_remove("ANNOTATOR_API_KEYS")
        .arg("annotate")
        .args(["--input", input.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no providers configured"));
}

#[test]
fn annotate_rejects_missing_input() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("pii-annotator")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("ANNOTATOR_HOME", tmp.path().join("home"))
        .arg("annotate")
        .args(["--input", "does-not-exist.txt"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("input file not found"));
}
