use std::fs;

use predicates::prelude::*;

#[test]
fn config_hash_requires_paths() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("strm")?
        .arg("config-hash")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
    Ok(())
}

#[test]
fn config_hash_ignores_key_order_and_layers_overrides() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    fs::write(&a, "logging:\n  filter: info\ndeployment:\n  restricted_lifecycle_types: true\n")?;
    fs::write(&b, "deployment:\n  restricted_lifecycle_types: true\nlogging:\n  filter: info\n")?;
    fs::write(&base, "deployment:\n  restricted_lifecycle_types: false\nlogging:\n  filter: info\n")?;
    fs::write(&local, "deployment:\n  restricted_lifecycle_types: true\n")?;

    let run = |paths: &[&std::path::Path]| -> anyhow::Result<String> {
        let out = assert_cmd::Command::cargo_bin("strm")?
            .arg("config-hash")
            .args(paths)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        Ok(String::from_utf8(out)?)
    };

    let first = run(&[&a])?;
    assert!(first.starts_with("config_hash="));
    assert_eq!(first, run(&[&b])?);
    assert_eq!(first, run(&[&base, &local])?);
    Ok(())
}
