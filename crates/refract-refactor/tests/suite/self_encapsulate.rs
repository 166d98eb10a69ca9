use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, ProgressMonitor};
use refract_refactor::{MemoryModel, Refactoring, SelfEncapsulateField, Severity, Visibility};
use refract_test_utils::word_range;

use crate::{check, memory_model, perform, text, undo_last};

const COUNTER: &str = "\
class Counter {
    int count;

    void increment() {
        count++;
    }

    int current() {
        return count;
    }
}
";

const CLIENT: &str = "\
class Client {
    void reset(Counter c) {
        c.count = 0;
        System.out.println(c.count);
    }
}
";

fn encapsulate(files: &[(&str, &str)], field: &str) -> (Arc<MemoryModel>, SelfEncapsulateField) {
    let model = memory_model(files);
    let (file, source) = files[0];
    let refactoring = SelfEncapsulateField::new(model.clone(), FileId::new(file), word_range(source, field, 0));
    (model, refactoring)
}

#[test]
fn accessors_are_added_and_accesses_rewritten() {
    let (model, mut refactoring) = encapsulate(&[("Counter.java", COUNTER), ("Client.java", CLIENT)], "count");
    let mut undo = perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Counter.java"),
        "\
class Counter {
    private int count;

    void increment() {
        setCount(getCount() + 1);
    }

    int current() {
        return getCount();
    }

    public int getCount() {
        return count;
    }

    public void setCount(int count) {
        this.count = count;
    }
}
"
    );
    assert_eq!(
        text(&model, "Client.java"),
        "\
class Client {
    void reset(Counter c) {
        c.setCount(0);
        System.out.println(c.getCount());
    }
}
"
    );

    undo_last(&model, &mut undo);
    assert_eq!(text(&model, "Counter.java"), COUNTER);
    assert_eq!(text(&model, "Client.java"), CLIENT);
}

#[test]
fn accessor_names_follow_the_field_type() {
    let source = "class Flag {\n    private boolean enabled;\n}\n";
    let (_model, mut refactoring) = encapsulate(&[("Flag.java", source)], "enabled");
    refactoring.check_activation(&ProgressMonitor::new()).unwrap();
    assert_eq!(refactoring.getter_name(), "isEnabled");
    assert_eq!(refactoring.setter_name(), "setEnabled");
}

#[test]
fn final_fields_only_get_a_getter() {
    let source = "\
class Config {
    protected final String name = \"x\";

    String describe() {
        return \"config \" + name;
    }
}
";
    let (model, mut refactoring) = encapsulate(&[("Config.java", source)], "name");
    refactoring.set_accessor_visibility(Visibility::PackagePrivate);
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Info);

    perform(&model, &mut refactoring);
    assert_eq!(
        text(&model, "Config.java"),
        "\
class Config {
    private final String name = \"x\";

    String describe() {
        return \"config \" + getName();
    }

    String getName() {
        return name;
    }
}
"
    );
}

#[test]
fn the_declaring_class_can_keep_direct_access() {
    let (model, mut refactoring) = encapsulate(&[("Counter.java", COUNTER)], "count");
    refactoring.set_encapsulate_declaring_class(false);
    perform(&model, &mut refactoring);

    let after = text(&model, "Counter.java");
    assert!(after.contains("        count++;\n"));
    assert!(after.contains("        return count;\n"));
    assert!(after.contains("public int getCount() {"));
}

#[test]
fn shadowing_locals_are_not_rewritten() {
    let source = "\
class Counter {
    private int count;

    void reset(int count) {
        this.count = count;
    }
}
";
    let (model, mut refactoring) = encapsulate(&[("Counter.java", source)], "count");
    refactoring.set_getter_name("value");
    refactoring.set_setter_name("update");
    perform(&model, &mut refactoring);
    assert!(text(&model, "Counter.java").contains("    void reset(int count) {\n        this.update(count);\n    }"));
}

#[test]
fn embedded_writes_are_reported() {
    let source = "\
class Counter {
    private int count;

    int next() {
        return count++;
    }
}
";
    let (_model, mut refactoring) = encapsulate(&[("Counter.java", source)], "count");
    assert_eq!(check(&mut refactoring).severity(), Severity::Warning);
}

#[test]
fn existing_accessors_are_errors() {
    let source = "\
class Counter {
    private int count;

    int getCount() {
        return count;
    }
}
";
    let (_model, mut refactoring) = encapsulate(&[("Counter.java", source)], "count");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);
}

#[test]
fn interface_constants_and_grouped_fields_are_fatal() {
    let interface = "interface Limits {\n    int MAX = 3;\n}\n";
    let (_model, mut refactoring) = encapsulate(&[("Limits.java", interface)], "MAX");
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);

    let grouped = "class Point {\n    int x, y;\n}\n";
    let (_model, mut refactoring) = encapsulate(&[("Point.java", grouped)], "x");
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);
}
