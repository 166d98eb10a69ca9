use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, ProgressMonitor, TextRange, TextSize};
use refract_refactor::{ExtractTemp, MemoryModel, Refactoring, Severity};
use refract_test_utils::{range_of, word_range};

use crate::{check, memory_model, perform, text};

const GREETER: &str = "\
class Greeter {
    String greet(String name) {
        System.out.println(\"Hello, \" + name);
        return \"Hello, \" + name;
    }
}
";

fn extract(source: &str, selection: TextRange) -> (Arc<MemoryModel>, ExtractTemp) {
    let model = memory_model(&[("Greeter.java", source)]);
    let refactoring = ExtractTemp::new(model.clone(), FileId::new("Greeter.java"), selection);
    (model, refactoring)
}

#[test]
fn declares_the_local_before_the_first_occurrence_and_replaces_all() {
    let (model, mut refactoring) = extract(GREETER, range_of(GREETER, "\"Hello, \" + name", 0));
    refactoring.set_temp_name("greeting");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Greeter.java"),
        "\
class Greeter {
    String greet(String name) {
        String greeting = \"Hello, \" + name;
        System.out.println(greeting);
        return greeting;
    }
}
"
    );
}

#[test]
fn only_the_selection_is_replaced_when_asked() {
    let (model, mut refactoring) = extract(GREETER, range_of(GREETER, "\"Hello, \" + name", 0));
    refactoring.set_temp_name("greeting");
    refactoring.set_replace_all_occurrences(false);
    refactoring.set_declare_final(true);
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Greeter.java"),
        "\
class Greeter {
    String greet(String name) {
        final String greeting = \"Hello, \" + name;
        System.out.println(greeting);
        return \"Hello, \" + name;
    }
}
"
    );
}

#[test]
fn crlf_line_endings_are_preserved() {
    let source = GREETER.replace('\n', "\r\n");
    let (model, mut refactoring) = extract(&source, range_of(&source, "\"Hello, \" + name", 0));
    refactoring.set_temp_name("greeting");
    perform(&model, &mut refactoring);

    let after = text(&model, "Greeter.java");
    assert!(after.contains("        String greeting = \"Hello, \" + name;\r\n        System.out.println(greeting);\r\n"));
    assert!(!after.replace("\r\n", "").contains('\n'));
}

#[test]
fn an_expression_statement_becomes_the_declaration() {
    let source = "\
class A {
    int compute(int x) {
        return x * 2;
    }

    void run(int x) {
        compute(x);
    }
}
";
    let (model, mut refactoring) = extract(source, range_of(source, "compute(x)", 0));
    let status = refactoring.check_activation(&ProgressMonitor::new()).unwrap();
    assert!(status.is_ok());
    assert_eq!(refactoring.temp_name(), "compute");
    assert_eq!(refactoring.inferred_type(), Some("int"));

    refactoring.set_temp_name("result");
    perform(&model, &mut refactoring);
    assert!(text(&model, "Greeter.java").contains("    void run(int x) {\n        int result = compute(x);\n    }"));
}

#[test]
fn types_are_inferred_from_the_expression_shape() {
    let source = "\
class A {
    void f(int a, int b, String s) {
        use(a > b);
        use(2L);
        use(s);
        use(new StringBuilder());
        use(new int[3][4]);
        use((double) a);
    }
}
";
    let cases = [
        (range_of(source, "a > b", 0), Some("boolean")),
        (range_of(source, "2L", 0), Some("long")),
        (word_range(source, "s", 1), Some("String")),
        (range_of(source, "new StringBuilder()", 0), Some("StringBuilder")),
        (range_of(source, "new int[3][4]", 0), Some("int[][]")),
        (range_of(source, "(double) a", 0), Some("double")),
    ];
    for (selection, expected) in cases {
        let expression = &source[selection];
        let (_model, mut refactoring) = extract(source, selection);
        let status = refactoring.check_activation(&ProgressMonitor::new()).unwrap();
        assert!(!status.has_fatal_error(), "`{expression}`:\n{status}");
        assert_eq!(refactoring.inferred_type(), expected, "`{expression}`");
    }
}

#[test]
fn shifts_are_typed_by_their_left_operand() {
    let source = "\
class A {
    void f(int a, long n) {
        use(a >> 2);
        use(a >>> 1);
        use(n << 3);
        use(a > 2);
    }
}
";
    let cases = [
        (range_of(source, "a >> 2", 0), Some("int")),
        (range_of(source, "a >>> 1", 0), Some("int")),
        (range_of(source, "n << 3", 0), Some("long")),
        (range_of(source, "a > 2", 0), Some("boolean")),
    ];
    for (selection, expected) in cases {
        let expression = &source[selection];
        let (_model, mut refactoring) = extract(source, selection);
        let status = refactoring.check_activation(&ProgressMonitor::new()).unwrap();
        assert!(!status.has_fatal_error(), "`{expression}`:\n{status}");
        assert_eq!(refactoring.inferred_type(), expected, "`{expression}`");
    }
}

#[test]
fn an_extracted_shift_is_declared_int() {
    let source = "\
class A {
    void f(int a) {
        int b = a >> 2;
    }
}
";
    let (model, mut refactoring) = extract(source, range_of(source, "a >> 2", 0));
    refactoring.set_temp_name("shifted");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Greeter.java"),
        "\
class A {
    void f(int a) {
        int shifted = a >> 2;
        int b = shifted;
    }
}
"
    );
}

#[test]
fn selections_that_are_not_expressions_are_fatal() {
    let source = "\
class A {
    int y = 1 + 2;

    void f() {
        int x;
        x = 5;
        String s = \"Hello\";
    }
}
";
    let empty = TextRange::empty(range_of(source, "5", 0).start());
    let partial = range_of(source, "\"Hel", 0);
    let target = word_range(source, "x", 1);
    let field_initializer = range_of(source, "1 + 2", 0);
    let statement = range_of(source, "x = 5;", 0);
    let declaration = range_of(source, "int x", 0);

    for selection in [empty, partial, target, field_initializer, statement, declaration] {
        let (_model, mut refactoring) = extract(source, selection);
        let status = check(&mut refactoring);
        assert_eq!(
            status.severity(),
            Severity::Fatal,
            "`{}` should not be extractable",
            &source[selection]
        );
    }
}

#[test]
fn a_colliding_name_is_an_error() {
    let (_model, mut refactoring) = extract(GREETER, range_of(GREETER, "\"Hello, \" + name", 1));
    refactoring.set_temp_name("name");
    let status = check(&mut refactoring);
    assert!(status.has_error());
    assert!(!status.has_fatal_error());
}

#[test]
fn the_selection_is_trimmed_to_whole_tokens() {
    let occurrence = range_of(GREETER, "\"Hello, \" + name", 1);
    let selection = TextRange::new(occurrence.start() - TextSize::from(1), occurrence.end());
    let (_model, mut refactoring) = extract(GREETER, selection);
    refactoring.set_temp_name("greeting");
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Info, "{status}");
}
