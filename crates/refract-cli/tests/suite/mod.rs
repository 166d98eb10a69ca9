use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;

mod refactor;
mod resolve;
mod scan;

pub(crate) const COUNTER: &str = "\
class A {
    int f(int n) {
        int count = n;
        // count grows by one
        count += 1;
        return count;
    }
}
";

pub(crate) fn refract() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("refract"));
    cmd.env_remove("REFRACT_CONFIG_PATH").env("RUST_LOG", "warn");
    cmd
}

/// A temporary workspace holding `files`; commands run with it as the current directory.
pub(crate) fn workspace(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (path, text) in files {
        temp.child(path).write_str(text).unwrap();
    }
    temp
}

pub(crate) fn read(temp: &TempDir, path: &str) -> String {
    std::fs::read_to_string(temp.child(path).path()).unwrap()
}

#[test]
fn help_mentions_core_commands() {
    use predicates::prelude::*;

    refract().arg("--help").assert().success().stdout(
        predicate::str::contains("refactor")
            .and(predicate::str::contains("resolve"))
            .and(predicate::str::contains("scan"))
            .and(predicate::str::contains("config-schema")),
    );
}

#[test]
fn config_schema_is_printed() {
    let output = refract().arg("config-schema").output().unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["properties"]["refactoring"].is_object(), "{schema}");
}
