use predicates::prelude::*;
use pretty_assertions::assert_eq;

use super::{read, refract, workspace, COUNTER};

const GREETER: &str = "\
class Greeter {
    String greet(String name) {
        System.out.println(\"Hello, \" + name);
        return \"Hello, \" + name;
    }
}
";

#[test]
fn preview_leaves_the_file_untouched() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-temp", "A.java", "--selection", "3:13-3:18", "--name", "total"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("-        int count = n;")
                .and(predicate::str::contains("+        int total = n;"))
                .and(predicate::str::contains("preview: 3 edits in 1 files")),
        );
    assert_eq!(read(&temp, "A.java"), COUNTER);
}

#[test]
fn apply_writes_the_change() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args([
            "refactor",
            "rename-temp",
            "A.java",
            "--selection",
            "3:13-3:18",
            "--name",
            "total",
            "--apply",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied: 3 edits in 1 files"));

    let text = read(&temp, "A.java");
    assert!(text.contains("int total = n;"), "{text}");
    assert!(text.contains("return total;"), "{text}");
    assert!(text.contains("// count grows by one"), "{text}");
}

#[test]
fn textual_matches_follow_the_flag() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-temp", "A.java", "--selection", "3:13", "--name", "total"])
        .args(["--textual-matches", "--apply"])
        .assert()
        .success();
    assert!(read(&temp, "A.java").contains("// total grows by one"));
}

#[test]
fn config_defaults_apply_to_refactorings() {
    let temp = workspace(&[
        ("A.java", COUNTER),
        ("refract.toml", "[refactoring]\nupdate_textual_matches = true\n"),
    ]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-temp", "A.java", "--selection", "3:13", "--name", "total", "--apply"])
        .assert()
        .success();
    assert!(read(&temp, "A.java").contains("// total grows by one"));
}

#[test]
fn extract_temp_replaces_a_single_occurrence() {
    let temp = workspace(&[("Greeter.java", GREETER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "extract-temp", "Greeter.java", "--selection", "3:28-3:44"])
        .args(["--name", "greeting", "--single-occurrence", "--final", "--apply"])
        .assert()
        .success();

    let text = read(&temp, "Greeter.java");
    assert!(text.contains("final String greeting = \"Hello, \" + name;"), "{text}");
    assert!(text.contains("System.out.println(greeting);"), "{text}");
    assert!(text.contains("return \"Hello, \" + name;"), "{text}");
}

#[test]
fn fatal_findings_block_the_refactoring() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-temp", "A.java", "--selection", "1:1-1:6", "--apply"])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("FATAL: Select a local variable or parameter.")
                .and(predicate::str::contains("blocked")),
        );
    assert_eq!(read(&temp, "A.java"), COUNTER);
}

#[test]
fn json_report_describes_the_preview() {
    let temp = workspace(&[("A.java", COUNTER)]);
    let output = refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-temp", "A.java", "--selection", "3:13-3:18", "--name", "total"])
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["refactoring"], "rename-temp");
    assert_eq!(report["blocked"], false);
    assert_eq!(report["applied"], false);
    assert_eq!(report["preview"]["total_edits"], 3);
    assert_eq!(report["preview"]["files"][0]["file"], "A.java");
}

#[test]
fn selections_outside_the_document_are_usage_errors() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "inline-temp", "A.java", "--selection", "99:1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("line 99 is past the end of the document"));
}

#[test]
fn unknown_refactorings_are_rejected() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-everything", "A.java", "--selection", "3:13"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown refactoring `rename-everything`"));
}

#[test]
fn package_rename_uses_the_workspace_root() {
    let temp = workspace(&[
        ("src/com/acme/util/Strings.java", "package com.acme.util;\n\npublic class Strings {}\n"),
        (
            "src/com/acme/app/Main.java",
            "package com.acme.app;\n\nimport com.acme.util.Strings;\n\npublic class Main {}\n",
        ),
    ]);
    refract()
        .current_dir(temp.path())
        .args(["refactor", "rename-package", "src/com/acme/util/Strings.java", "--root", "."])
        .args(["--selection", "1:9-1:22", "--name", "com.acme.text", "--apply"])
        .assert()
        .success();

    assert!(temp.path().join("src/com/acme/text/Strings.java").is_file());
    assert!(!temp.path().join("src/com/acme/util/Strings.java").exists());
    assert!(read(&temp, "src/com/acme/app/Main.java").contains("import com.acme.text.Strings;"));
}
