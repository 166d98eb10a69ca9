use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, TextRange};
use refract_refactor::{MemoryModel, RenameParameters, Severity};
use refract_test_utils::word_range;

use crate::{check, memory_model, perform, text};

const MAILER: &str = "\
class Mailer {
    private String subject;

    /**
     * Sends a message.
     * @param to the recipient
     * @param body the text
     */
    void send(String to, String body) {
        String line = to + \": \" + body;
        System.out.println(line);
    }
}
";

fn rename(selection: TextRange) -> (Arc<MemoryModel>, RenameParameters) {
    let model = memory_model(&[("Mailer.java", MAILER)]);
    let refactoring = RenameParameters::new(model.clone(), FileId::new("Mailer.java"), selection);
    (model, refactoring)
}

#[test]
fn references_and_param_tags_are_renamed() {
    let (model, mut refactoring) = rename(word_range(MAILER, "send", 0));
    refactoring.set_new_name(0, "recipient");
    refactoring.set_new_name(1, "text");
    perform(&model, &mut refactoring);

    assert_eq!(
        text(&model, "Mailer.java"),
        "\
class Mailer {
    private String subject;

    /**
     * Sends a message.
     * @param recipient the recipient
     * @param text the text
     */
    void send(String recipient, String text) {
        String line = recipient + \": \" + text;
        System.out.println(line);
    }
}
"
    );
}

#[test]
fn a_parameter_selects_its_method() {
    let (model, mut refactoring) = rename(word_range(MAILER, "body", 1));
    check(&mut refactoring);
    assert_eq!(refactoring.parameter_names(), ["to", "body"]);

    refactoring.set_new_name(1, "content");
    perform(&model, &mut refactoring);
    let after = text(&model, "Mailer.java");
    assert!(after.contains("void send(String to, String content) {"));
    assert!(after.contains("@param content the text"));
}

#[test]
fn swapping_two_names_is_allowed() {
    let (model, mut refactoring) = rename(word_range(MAILER, "send", 0));
    refactoring.set_new_name(0, "body");
    refactoring.set_new_name(1, "to");
    perform(&model, &mut refactoring);
    assert!(text(&model, "Mailer.java").contains("String line = body + \": \" + to;"));
}

#[test]
fn conflicting_names_are_errors() {
    let (_model, mut refactoring) = rename(word_range(MAILER, "send", 0));
    refactoring.set_new_name(1, "to");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    let (_model, mut refactoring) = rename(word_range(MAILER, "send", 0));
    refactoring.set_new_name(0, "line");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    let (_model, mut refactoring) = rename(word_range(MAILER, "send", 0));
    refactoring.set_new_name(0, "subject");
    assert_eq!(check(&mut refactoring).severity(), Severity::Warning);
}

#[test]
fn missing_or_invalid_renames_are_fatal() {
    let configure: [fn(&mut RenameParameters); 4] = [
        |_| {},
        |r| r.set_new_name(0, "to"),
        |r| r.set_new_name(2, "extra"),
        |r| r.set_new_name(0, "default"),
    ];
    for configure in configure {
        let (_model, mut refactoring) = rename(word_range(MAILER, "send", 0));
        configure(&mut refactoring);
        assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);
    }
}

#[test]
fn methods_without_parameters_are_fatal() {
    let source = "class A {\n    void f() {\n    }\n}\n";
    let model = memory_model(&[("A.java", source)]);
    let mut refactoring = RenameParameters::new(model, FileId::new("A.java"), word_range(source, "f", 0));
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);
}
