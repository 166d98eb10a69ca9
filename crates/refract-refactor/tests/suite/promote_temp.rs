use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::FileId;
use refract_refactor::{InitializeIn, MemoryModel, PromoteTempToField, Severity, Visibility};
use refract_test_utils::word_range;

use crate::{check, memory_model, perform, text};

const COUNTER: &str = "\
class Counter {
    int next() {
        int step = 2;
        return step * 3;
    }
}
";

fn promote(source: &str, name: &str) -> (Arc<MemoryModel>, PromoteTempToField) {
    let model = memory_model(&[("Counter.java", source)]);
    let refactoring = PromoteTempToField::new(model.clone(), FileId::new("Counter.java"), word_range(source, name, 0));
    (model, refactoring)
}

#[test]
fn the_declaration_becomes_an_assignment() {
    let (model, mut refactoring) = promote(COUNTER, "step");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Counter.java"),
        "\
class Counter {
    private int step;
    int next() {
        step = 2;
        return step * 3;
    }
}
"
    );
}

#[test]
fn the_field_can_carry_the_initializer_under_a_new_name() {
    let (model, mut refactoring) = promote(COUNTER, "step");
    refactoring.set_initialize_in(InitializeIn::Field);
    refactoring.set_field_name("factor");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Counter.java"),
        "\
class Counter {
    private int factor = 2;
    int next() {
        return factor * 3;
    }
}
"
    );
}

#[test]
fn a_constructor_is_generated_when_none_exists() {
    let (model, mut refactoring) = promote(COUNTER, "step");
    refactoring.set_initialize_in(InitializeIn::Constructor);
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Counter.java"),
        "\
class Counter {
    private int step;

    public Counter() {
        step = 2;
    }

    int next() {
        return step * 3;
    }
}
"
    );
}

#[test]
fn existing_constructors_assign_the_field() {
    let source = "\
class Counter {
    private int base;

    Counter() {
        base = 1;
    }

    int next() {
        int step = 2;
        return base + step;
    }
}
";
    let (model, mut refactoring) = promote(source, "step");
    refactoring.set_initialize_in(InitializeIn::Constructor);
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Counter.java"),
        "\
class Counter {
    private int step;
    private int base;

    Counter() {
        step = 2;
        base = 1;
    }

    int next() {
        return base + step;
    }
}
"
    );
}

#[test]
fn locals_of_static_methods_become_static_fields() {
    let source = "\
class Util {
    static int twice(int x) {
        int factor = 2;
        return x * factor;
    }
}
";
    let (model, mut refactoring) = promote(source, "factor");
    refactoring.set_visibility(Visibility::Protected);
    perform(&model, &mut refactoring);

    let after = text(&model, "Counter.java");
    assert!(after.starts_with("class Util {\n    protected static int factor;\n"), "{after}");
    assert!(after.contains("        factor = 2;\n"));
}

#[test]
fn unsupported_configurations_are_errors() {
    let source = "\
class Counter {
    private int step;

    int next(int base) {
        int offset = base + 1;
        return offset;
    }
}
";
    let (_model, mut refactoring) = promote(source, "offset");
    refactoring.set_initialize_in(InitializeIn::Constructor);
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    let (_model, mut refactoring) = promote(source, "offset");
    refactoring.set_declare_final(true);
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    let (_model, mut refactoring) = promote(source, "offset");
    refactoring.set_field_name("step");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);
}

#[test]
fn inferred_and_loop_variables_cannot_be_promoted() {
    let source = "\
class A {
    void f() {
        var list = new java.util.ArrayList<String>();
        for (int i = 0; i < 3; i++) {
            list.add(\"x\");
        }
    }
}
";
    for name in ["list", "i"] {
        let (_model, mut refactoring) = promote(source, name);
        assert_eq!(check(&mut refactoring).severity(), Severity::Fatal, "`{name}`");
    }
}
