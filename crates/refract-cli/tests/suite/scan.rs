use predicates::prelude::*;

use super::{refract, workspace};

const SOURCE: &str = "\
class A {
    /** count docs */
    int f() {
        // count here
        String s = \"count\";
        int count = 0;
        return count;
    }
}
";

#[test]
fn reports_matches_by_position() {
    let temp = workspace(&[("A.java", SOURCE)]);
    refract()
        .current_dir(temp.path())
        .args(["scan", "A.java", "--pattern", "count"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("A.java:2:9: javadoc")
                .and(predicate::str::contains("A.java:4:12: comment"))
                .and(predicate::str::contains("A.java:5:21: string"))
                .and(predicate::str::contains("3 matches for `count`")),
        );
}

#[test]
fn flags_narrow_the_scan() {
    let temp = workspace(&[("A.java", SOURCE)]);
    let output = refract()
        .current_dir(temp.path())
        .args(["scan", "A.java", "--pattern", "count", "--no-strings", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 2);
    assert_eq!(report["strings"], 0);
    assert_eq!(report["matches"][1]["category"], "comment");
}

#[test]
fn config_scanner_section_sets_the_defaults() {
    let temp = workspace(&[
        ("A.java", SOURCE),
        ("refract.toml", "[scanner]\ncomments = false\n"),
    ]);
    refract()
        .current_dir(temp.path())
        .args(["scan", "A.java", "--pattern", "count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 matches for `count` (1 javadoc, 0 comments, 1 strings)"));
}

#[test]
fn files_outside_the_root_are_rejected() {
    let temp = workspace(&[("A.java", SOURCE)]);
    let other = workspace(&[]);
    refract()
        .arg("scan")
        .arg(temp.path().join("A.java"))
        .arg("--root")
        .arg(other.path())
        .args(["--pattern", "count"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not inside the workspace root"));
}
