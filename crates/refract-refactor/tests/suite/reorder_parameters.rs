use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::FileId;
use refract_refactor::{MemoryModel, ReorderParameters, Severity};
use refract_test_utils::word_range;

use crate::{check, memory_model, perform, text, undo_last};

const SHAPES: &str = "\
class Shapes {
    void draw(int width, int height, String label) {
        System.out.println(label + width + height);
    }

    void demo() {
        draw(1, 2, \"a\");
    }
}
";

const CLIENT: &str = "\
class Client {
    void use(Shapes shapes) {
        shapes.draw(3, 4, \"b\");
        shapes.draw(5, 6);
    }
}
";

fn reorder(files: &[(&str, &str)], method: &str) -> (Arc<MemoryModel>, ReorderParameters) {
    let model = memory_model(files);
    let (file, source) = files[0];
    let refactoring = ReorderParameters::new(model.clone(), FileId::new(file), word_range(source, method, 0));
    (model, refactoring)
}

#[test]
fn declaration_and_calls_in_every_file_are_permuted() {
    let (model, mut refactoring) = reorder(&[("Shapes.java", SHAPES), ("Client.java", CLIENT)], "draw");
    refactoring.set_new_order(vec![2, 0, 1]);
    let mut undo = perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Shapes.java"),
        "\
class Shapes {
    void draw(String label, int width, int height) {
        System.out.println(label + width + height);
    }

    void demo() {
        draw(\"a\", 1, 2);
    }
}
"
    );
    assert_eq!(
        text(&model, "Client.java"),
        "\
class Client {
    void use(Shapes shapes) {
        shapes.draw(\"b\", 3, 4);
        shapes.draw(5, 6);
    }
}
"
    );

    undo_last(&model, &mut undo);
    assert_eq!(text(&model, "Shapes.java"), SHAPES);
    assert_eq!(text(&model, "Client.java"), CLIENT);
}

#[test]
fn nested_calls_are_permuted_too() {
    let source = "\
class A {
    int pair(int a, int b) {
        return a - b;
    }

    int run() {
        return pair(pair(1, 2), 3);
    }
}
";
    let (model, mut refactoring) = reorder(&[("A.java", source)], "pair");
    refactoring.set_new_order(vec![1, 0]);
    perform(&model, &mut refactoring);
    assert!(text(&model, "A.java").contains("return pair(3, pair(2, 1));"));
}

#[test]
fn the_parameter_names_are_reported_after_activation() {
    let (_model, mut refactoring) = reorder(&[("Shapes.java", SHAPES)], "draw");
    refactoring.set_new_order(vec![1, 0, 2]);
    check(&mut refactoring);
    assert_eq!(refactoring.parameter_names(), ["width", "height", "label"]);
}

#[test]
fn invalid_orders_are_rejected() {
    let (_model, mut refactoring) = reorder(&[("Shapes.java", SHAPES)], "draw");
    refactoring.set_new_order(vec![0, 1, 2]);
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    for order in [vec![0, 0, 1], vec![0, 1], vec![3, 1, 0]] {
        let (_model, mut refactoring) = reorder(&[("Shapes.java", SHAPES)], "draw");
        refactoring.set_new_order(order.clone());
        assert_eq!(check(&mut refactoring).severity(), Severity::Fatal, "{order:?}");
    }
}

#[test]
fn variable_arity_parameters_stay_last() {
    let source = "\
class Log {
    void log(String format, int level, Object... args) {
    }
}
";
    let (_model, mut refactoring) = reorder(&[("Log.java", source)], "log");
    refactoring.set_new_order(vec![2, 0, 1]);
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);

    let (_model, mut refactoring) = reorder(&[("Log.java", source)], "log");
    refactoring.set_new_order(vec![1, 0, 2]);
    assert!(check(&mut refactoring).is_ok());
}

#[test]
fn methods_need_two_parameters() {
    let source = "class A {\n    void f(int a) {\n    }\n}\n";
    let (_model, mut refactoring) = reorder(&[("A.java", source)], "f");
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);
}

#[test]
fn clashing_and_ambiguous_overloads_are_reported() {
    let source = "\
class A {
    void f(int a, String b) {
    }

    void f(String b, int a) {
    }

    void f(long a, long b) {
    }
}
";
    let (_model, mut refactoring) = reorder(&[("A.java", source)], "f");
    refactoring.set_new_order(vec![1, 0]);
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Error);
    assert_eq!(status.messages_matching(Severity::Warning).len(), 1);
}

#[test]
fn read_only_callers_are_errors() {
    let (model, mut refactoring) = reorder(&[("Shapes.java", SHAPES), ("Client.java", CLIENT)], "draw");
    model.set_read_only(&FileId::new("Client.java"), true);
    refactoring.set_new_order(vec![1, 0, 2]);
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Error);
}
