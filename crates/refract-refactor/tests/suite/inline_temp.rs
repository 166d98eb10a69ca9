use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, TextRange};
use refract_refactor::{InlineTemp, MemoryModel, Severity};
use refract_test_utils::{extract_selection, word_range};

use crate::{check, memory_model, perform, text, undo_last};

const SUM: &str = "\
class A {
    int f(int a, int b) {
        int sum = a + b;
        return sum * 2;
    }
}
";

fn inline(source: &str, selection: TextRange) -> (Arc<MemoryModel>, InlineTemp) {
    let model = memory_model(&[("A.java", source)]);
    let refactoring = InlineTemp::new(model.clone(), FileId::new("A.java"), selection);
    (model, refactoring)
}

#[test]
fn references_get_the_parenthesized_initializer() {
    let (model, mut refactoring) = inline(SUM, word_range(SUM, "sum", 0));
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "A.java"),
        "\
class A {
    int f(int a, int b) {
        return (a + b) * 2;
    }
}
"
    );
}

#[test]
fn a_caret_inside_the_name_is_enough() {
    let (source, caret) = extract_selection(
        "class A {\n    int f(int a, int b) {\n        int s/*caret*/um = a + b;\n        return sum * 2;\n    }\n}\n",
    );
    let (model, mut refactoring) = inline(&source, caret);
    assert_eq!(refactoring.variable_name(), None);
    perform(&model, &mut refactoring);
    assert_eq!(refactoring.variable_name(), Some("sum"));
    assert!(text(&model, "A.java").contains("return (a + b) * 2;"));
}

#[test]
fn a_reference_selects_its_declaration() {
    let (model, mut refactoring) = inline(SUM, word_range(SUM, "sum", 1));
    let mut undo = perform(&model, &mut refactoring);
    assert!(text(&model, "A.java").contains("return (a + b) * 2;"));

    undo_last(&model, &mut undo);
    assert_eq!(text(&model, "A.java"), SUM);
}

#[test]
fn one_declarator_of_several_is_removed() {
    let source = "\
class A {
    int f() {
        int x = 1, y = 2;
        return x + y;
    }
}
";
    let (model, mut refactoring) = inline(source, word_range(source, "x", 0));
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "A.java"),
        "\
class A {
    int f() {
        int y = 2;
        return 1 + y;
    }
}
"
    );
}

#[test]
fn uninlinable_variables_are_fatal() {
    let source = "\
class A {
    int f(int p) {
        int twice = 1;
        twice = 2;
        int later;
        later = 3;
        for (int i = 0; i < p; i++) {
            p += i;
        }
        return twice + later;
    }
}
";
    for name in ["p", "twice", "later", "i"] {
        let (_model, mut refactoring) = inline(source, word_range(source, name, 0));
        let status = check(&mut refactoring);
        assert_eq!(status.severity(), Severity::Fatal, "`{name}`:\n{status}");
    }
}

#[test]
fn duplicating_a_call_is_a_warning() {
    let source = "\
class A {
    int next() {
        return 1;
    }

    int f() {
        int n = next();
        return n + n;
    }
}
";
    let (_model, mut refactoring) = inline(source, word_range(source, "n", 0));
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Warning, "{status}");
}

#[test]
fn an_unused_variable_is_just_removed() {
    let source = "\
class A {
    void f() {
        int unused = 42;
    }
}
";
    let (model, mut refactoring) = inline(source, word_range(source, "unused", 0));
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Info);

    perform(&model, &mut refactoring);
    assert_eq!(text(&model, "A.java"), "class A {\n    void f() {\n    }\n}\n");
}
