use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, ProgressMonitor};
use refract_refactor::{generate_preview, FileChangeKind, MemoryModel, Refactoring, RenamePackage, Severity};
use refract_test_utils::range_of;

use crate::{check, memory_model, perform, text, undo_last};

const STRINGS: &str = "\
package com.acme.util;

public class Strings {
    public static String trim(String s) {
        return s.trim();
    }
}
";

const LISTS: &str = "\
package com.acme.util;

public class Lists {
}
";

const MAIN: &str = "\
package com.acme.app;

import com.acme.util.Strings;
import com.acme.util.*;
import static com.acme.util.Strings.trim;

public class Main {
    String run() {
        com.acme.util.Lists lists = null;
        return trim(\" x \");
    }
}
";

fn workspace(extra: &[(&str, &str)]) -> Arc<MemoryModel> {
    let mut files = vec![
        ("src/com/acme/util/Strings.java", STRINGS),
        ("src/com/acme/util/Lists.java", LISTS),
        ("src/com/acme/app/Main.java", MAIN),
    ];
    files.extend_from_slice(extra);
    memory_model(&files)
}

fn rename(model: &Arc<MemoryModel>, new_name: &str) -> RenamePackage {
    let mut refactoring = RenamePackage::new(
        model.clone(),
        FileId::new("src/com/acme/util/Strings.java"),
        range_of(STRINGS, "com.acme.util", 0),
    );
    refactoring.set_new_name(new_name);
    refactoring
}

#[test]
fn declarations_imports_and_qualified_names_are_renamed_and_files_moved() {
    let model = workspace(&[]);
    let mut refactoring = rename(&model, "com.acme.text");
    perform(&model, &mut refactoring);

    let files: Vec<String> = model.snapshot().keys().map(|f| f.to_string()).collect();
    assert_eq!(
        files,
        [
            "src/com/acme/app/Main.java",
            "src/com/acme/text/Lists.java",
            "src/com/acme/text/Strings.java",
        ]
    );
    assert!(text(&model, "src/com/acme/text/Strings.java").starts_with("package com.acme.text;\n"));
    assert_eq!(
        text(&model, "src/com/acme/app/Main.java"),
        "\
package com.acme.app;

import com.acme.text.Strings;
import com.acme.text.*;
import static com.acme.text.Strings.trim;

public class Main {
    String run() {
        com.acme.text.Lists lists = null;
        return trim(\" x \");
    }
}
"
    );
}

#[test]
fn undo_moves_the_files_back() {
    let model = workspace(&[]);
    let before = model.snapshot();
    let mut refactoring = rename(&model, "com.acme.text");
    let mut undo = perform(&model, &mut refactoring);

    undo_last(&model, &mut undo);
    assert_eq!(model.snapshot(), before);
}

#[test]
fn references_can_be_left_alone() {
    let model = workspace(&[]);
    let mut refactoring = rename(&model, "com.acme.text");
    refactoring.set_update_references(false);
    perform(&model, &mut refactoring);
    assert_eq!(text(&model, "src/com/acme/app/Main.java"), MAIN);
}

#[test]
fn the_preview_lists_moves_and_edits() {
    let model = workspace(&[]);
    let mut refactoring = rename(&model, "com.acme.text");
    assert!(check(&mut refactoring).is_ok());
    let change = refactoring.create_change(&ProgressMonitor::new()).unwrap();
    let preview = generate_preview(model.as_ref(), change.as_ref()).unwrap();

    assert_eq!(preview.file_moves.len(), 2);
    assert_eq!(preview.total_files, 3);
    let strings = preview
        .files
        .iter()
        .find(|f| f.file == FileId::new("src/com/acme/text/Strings.java"))
        .expect("moved file in preview");
    assert_eq!(
        strings.change,
        FileChangeKind::Renamed {
            from: FileId::new("src/com/acme/util/Strings.java"),
            to: FileId::new("src/com/acme/text/Strings.java"),
        }
    );
    assert!(strings.unified_diff.contains("-package com.acme.util;"));
    assert!(strings.unified_diff.contains("+package com.acme.text;"));
    // The preview never touches the model.
    assert_eq!(text(&model, "src/com/acme/app/Main.java"), MAIN);
}

#[test]
fn invalid_and_existing_names_are_fatal() {
    for name in ["com..acme", "com.acme.util", "com.acme.app", "com.1acme"] {
        let model = workspace(&[]);
        let mut refactoring = rename(&model, name);
        assert_eq!(check(&mut refactoring).severity(), Severity::Fatal, "`{name}`");
    }
}

#[test]
fn the_default_package_cannot_be_renamed() {
    let source = "class A {\n}\n";
    let model = memory_model(&[("A.java", source)]);
    let mut refactoring = RenamePackage::new(model, FileId::new("A.java"), range_of(source, "A", 0));
    refactoring.set_new_name("p");
    assert_eq!(check(&mut refactoring).severity(), Severity::Fatal);
}

#[test]
fn files_outside_the_package_directory_stay_in_place() {
    let model = workspace(&[("Loose.java", "package com.acme.util;\n\nclass Loose {\n}\n")]);
    let mut refactoring = rename(&model, "com.acme.text");
    let status = check(&mut refactoring);
    assert_eq!(status.severity(), Severity::Info);

    perform(&model, &mut refactoring);
    assert_eq!(text(&model, "Loose.java"), "package com.acme.text;\n\nclass Loose {\n}\n");
}

#[test]
fn occupied_targets_and_read_only_files_are_errors() {
    let model = workspace(&[("src/com/acme/text/Lists.java", "class Lists {\n}\n")]);
    let mut refactoring = rename(&model, "com.acme.text");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);

    let model = workspace(&[]);
    model.set_read_only(&FileId::new("src/com/acme/app/Main.java"), true);
    let mut refactoring = rename(&model, "com.acme.text");
    assert_eq!(check(&mut refactoring).severity(), Severity::Error);
}
