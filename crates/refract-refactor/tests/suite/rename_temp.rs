use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, ProgressMonitor};
use refract_refactor::{ChangeContext, MemoryModel, RenameTemp, ScanFlags, Severity};
use refract_test_utils::word_range;

use crate::{check, memory_model, perform, text, undo_last};

const COUNTER: &str = "\
class A {
    int f(int n) {
        int count = n;
        // count grows by one
        count += 1;
        return count;
    }
}
";

fn rename(source: &str, needle: &str, nth: usize, new_name: &str) -> (Arc<MemoryModel>, RenameTemp) {
    let model = memory_model(&[("A.java", source)]);
    let mut refactoring = RenameTemp::new(model.clone(), FileId::new("A.java"), word_range(source, needle, nth));
    refactoring.set_new_name(new_name);
    (model, refactoring)
}

#[test]
fn renames_declaration_and_references() {
    let (model, mut refactoring) = rename(COUNTER, "count", 0, "total");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "A.java"),
        "\
class A {
    int f(int n) {
        int total = n;
        // count grows by one
        total += 1;
        return total;
    }
}
"
    );
}

#[test]
fn selecting_a_reference_renames_the_local() {
    let (model, mut refactoring) = rename(COUNTER, "count", 3, "total");
    perform(&model, &mut refactoring);
    assert_eq!(text(&model, "A.java").matches("total").count(), 3);
}

#[test]
fn textual_matches_in_the_method_are_updated_on_request() {
    let (model, mut refactoring) = rename(COUNTER, "count", 0, "total");
    refactoring.set_update_textual_matches(true);
    perform(&model, &mut refactoring);
    assert!(text(&model, "A.java").contains("// total grows by one"));
}

#[test]
fn textual_matches_follow_the_scan_flags() {
    let (model, mut refactoring) = rename(COUNTER, "count", 0, "total");
    refactoring.set_update_textual_matches(true);
    refactoring.set_textual_scan_flags(ScanFlags {
        comments: false,
        javadoc: true,
        strings: true,
    });
    perform(&model, &mut refactoring);
    assert!(text(&model, "A.java").contains("// count grows by one"));
}

#[test]
fn parameters_can_be_renamed() {
    let (model, mut refactoring) = rename(COUNTER, "n", 0, "start");
    perform(&model, &mut refactoring);
    let after = text(&model, "A.java");
    assert!(after.contains("int f(int start) {"));
    assert!(after.contains("int count = start;"));
}

#[test]
fn undo_and_redo_restore_the_source() {
    let (model, mut refactoring) = rename(COUNTER, "count", 0, "total");
    let mut undo = perform(&model, &mut refactoring);
    let renamed = text(&model, "A.java");

    undo_last(&model, &mut undo);
    assert_eq!(text(&model, "A.java"), COUNTER);
    assert!(undo.can_redo());

    let mut ctx = ChangeContext::new(model.as_ref());
    undo.redo(&mut ctx, &ProgressMonitor::new()).expect("redo");
    assert_eq!(text(&model, "A.java"), renamed);
}

#[test]
fn a_name_captured_by_another_variable_is_an_error() {
    let (_model, mut refactoring) = rename(COUNTER, "count", 0, "n");
    let status = check(&mut refactoring);
    assert!(status.has_error());
    assert!(!status.has_fatal_error());
}

#[test]
fn invalid_or_unchanged_names_are_fatal() {
    for name in ["count", "class", "1st", ""] {
        let (_model, mut refactoring) = rename(COUNTER, "count", 0, name);
        let status = check(&mut refactoring);
        assert!(status.has_fatal_error(), "`{name}` should be rejected:\n{status}");
    }
}

#[test]
fn shadowing_a_field_is_a_warning() {
    let source = "\
class A {
    int total;

    int f() {
        int count = 1;
        return count;
    }
}
";
    let (_model, mut refactoring) = rename(source, "count", 0, "total");
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Warning);
}

#[test]
fn fields_are_not_local_variables() {
    let source = "class A {\n    int count;\n}\n";
    let (_model, mut refactoring) = rename(source, "count", 0, "total");
    let status = check(&mut refactoring);
    assert!(status.has_fatal_error());
}
