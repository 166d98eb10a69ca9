//! End-to-end tests for the concrete refactorings, run against an in-memory model.

use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor};
use refract_refactor::{
    perform_change, ChangeContext, MemoryModel, PerformOutcome, Refactoring, RefactoringStatus,
    UndoStack,
};

mod suite;

pub(crate) fn memory_model(files: &[(&str, &str)]) -> Arc<MemoryModel> {
    Arc::new(MemoryModel::new(
        files
            .iter()
            .map(|(path, text)| (FileId::new(*path), text.to_string())),
    ))
}

/// Activation, then input unless activation was FATAL.
pub(crate) fn check(refactoring: &mut dyn Refactoring) -> RefactoringStatus {
    let monitor = ProgressMonitor::new();
    let mut status = refactoring
        .check_activation(&monitor)
        .expect("activation check");
    if status.has_fatal_error() {
        return status;
    }
    status.merge(refactoring.check_input(&monitor).expect("input check"));
    status
}

/// Check, create and perform; panics when the checks report an error.
pub(crate) fn perform(model: &MemoryModel, refactoring: &mut dyn Refactoring) -> UndoStack {
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

pub(crate) fn undo_last(model: &MemoryModel, undo: &mut UndoStack) {
    let mut ctx = ChangeContext::new(model);
    let label = undo
        .undo(&mut ctx, &ProgressMonitor::new())
        .expect("undo");
    assert!(label.is_some(), "nothing to undo");
}

pub(crate) fn text(model: &MemoryModel, file: &str) -> String {
    model
        .text(&FileId::new(file))
        .unwrap_or_else(|| panic!("no file `{file}`"))
}
