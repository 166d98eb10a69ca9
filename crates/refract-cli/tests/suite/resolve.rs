use predicates::prelude::*;

use super::{refract, workspace, COUNTER};

#[test]
fn resolves_a_local_variable() {
    let temp = workspace(&[("A.java", COUNTER)]);
    let output = refract()
        .current_dir(temp.path())
        .args(["resolve", "A.java", "--selection", "5:9-5:14", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["element"]["kind"], "local_variable");
    assert_eq!(report["element"]["name"], "count");
    assert_eq!(report["position"]["start_line"], 3);
    assert_eq!(report["position"]["start_column"], 13);
}

#[test]
fn human_output_names_the_element() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["resolve", "A.java", "--selection", "2:15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A.java:2:15-2:16: parameter `n`"));
}

#[test]
fn whitespace_resolves_to_nothing() {
    let temp = workspace(&[("A.java", COUNTER)]);
    refract()
        .current_dir(temp.path())
        .args(["resolve", "A.java", "--selection", "3:1-3:5"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no element at the selection"));
}
