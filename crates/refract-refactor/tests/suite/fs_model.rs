use std::sync::Arc;

use pretty_assertions::assert_eq;
use refract_core::{FileId, ProgressMonitor};
use refract_refactor::{
    perform_change, ChangeContext, ElementModel, FsModel, PerformOutcome, Refactoring, RenamePackage,
    RenameTemp, UndoStack,
};
use refract_test_utils::{range_of, write_temp_workspace, Fixture};

use crate::check;

const FIXTURE: &str = "\
//- src/A.java
class A {
    int f(int n) {
        int $0count$1 = n;
        return count;
    }
}
//- notes.txt
count
";

fn apply(model: &FsModel, refactoring: &mut dyn Refactoring) -> UndoStack {
    let status = check(refactoring);
    assert!(!status.has_error(), "unexpected findings:\n{status}");
    let monitor = ProgressMonitor::new();
    let change = refactoring.create_change(&monitor).expect("create change");
    let mut undo = UndoStack::new();
    let mut ctx = ChangeContext::new(model);
    let outcome = perform_change(change, &mut ctx, &mut undo, &monitor).expect("perform change");
    assert_eq!(outcome, PerformOutcome::Performed);
    undo
}

fn ids(model: &FsModel) -> Vec<String> {
    model.files().iter().map(|f| f.to_string()).collect()
}

#[test]
fn only_java_sources_are_listed() {
    let fixture = Fixture::parse(FIXTURE);
    let dir = write_temp_workspace(fixture.files().iter().map(|(f, t)| (f.as_str(), t.as_str())));
    let model = FsModel::new(dir.path());

    assert_eq!(ids(&model), ["src/A.java"]);
    assert_eq!(model.file_id(&dir.path().join("src").join("A.java")), Some(FileId::new("src/A.java")));
    assert_eq!(model.file_id(std::path::Path::new("/elsewhere/A.java")), None);
    assert!(model.read_source(&FileId::new("src/B.java")).is_err());
}

#[test]
fn rename_temp_writes_through_and_undoes() {
    let fixture = Fixture::parse(FIXTURE);
    let dir = write_temp_workspace(fixture.files().iter().map(|(f, t)| (f.as_str(), t.as_str())));
    let model = Arc::new(FsModel::new(dir.path()));
    let (file, selection) = fixture.selection(0, 1);

    let mut refactoring = RenameTemp::new(model.clone(), file.clone(), selection);
    refactoring.set_new_name("total");
    let mut undo = apply(&model, &mut refactoring);

    let renamed = model.read_source(&file).unwrap();
    assert!(renamed.contains("int total = n;"), "{renamed}");
    assert!(renamed.contains("return total;"), "{renamed}");

    let mut ctx = ChangeContext::new(model.as_ref());
    undo.undo(&mut ctx, &ProgressMonitor::new()).unwrap();
    assert_eq!(model.read_source(&file).unwrap(), fixture.text("src/A.java"));
}

#[test]
fn package_rename_moves_files_on_disk() {
    let strings = "package com.acme.util;\n\npublic class Strings {}\n";
    let dir = write_temp_workspace([
        ("src/com/acme/util/Strings.java", strings),
        ("src/com/acme/util/Lists.java", "package com.acme.util;\n\npublic class Lists {}\n"),
        (
            "src/com/acme/app/Main.java",
            "package com.acme.app;\n\nimport com.acme.util.Strings;\n\npublic class Main {}\n",
        ),
    ]);
    let model = Arc::new(FsModel::new(dir.path()));
    let before = ids(&model);

    let mut refactoring = RenamePackage::new(
        model.clone(),
        FileId::new("src/com/acme/util/Strings.java"),
        range_of(strings, "com.acme.util", 0),
    );
    refactoring.set_new_name("com.acme.text");
    let mut undo = apply(&model, &mut refactoring);

    assert_eq!(
        ids(&model),
        [
            "src/com/acme/app/Main.java",
            "src/com/acme/text/Lists.java",
            "src/com/acme/text/Strings.java",
        ]
    );
    assert!(!dir.path().join("src/com/acme/util").exists());
    let main = model.read_source(&FileId::new("src/com/acme/app/Main.java")).unwrap();
    assert!(main.contains("import com.acme.text.Strings;"), "{main}");

    let mut ctx = ChangeContext::new(model.as_ref());
    undo.undo(&mut ctx, &ProgressMonitor::new()).unwrap();
    assert_eq!(ids(&model), before);
    assert_eq!(
        model.read_source(&FileId::new("src/com/acme/util/Strings.java")).unwrap(),
        strings
    );
}
