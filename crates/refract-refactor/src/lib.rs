//! Refactoring engine for Refract.
//!
//! The crate is organised around the four-stage [`Refactoring`] protocol:
//! - diagnostics are accumulated in a [`RefactoringStatus`] (`status`)
//! - source modifications are expressed as undoable [`Change`] trees (`change`, `undo`)
//! - [`RefactoringSession`] enforces stage ordering and drives a refactoring to completion
//! - [`RefactoringScanner`] finds textual occurrences in comments, Javadoc and strings
//! - concrete refactorings operate on an [`ElementModel`] (`model`)

pub mod change;
pub mod element;
pub mod model;
pub mod names;
pub mod perform;
pub mod preview;
pub mod refactoring;
pub mod scanner;
pub mod status;
pub mod undo;

mod support;
mod tokens;

mod extract_temp;
mod inline_temp;
mod promote_temp;
mod rename_package;
mod rename_parameters;
mod rename_temp;
mod reorder_parameters;
mod self_encapsulate;

pub use change::{
    AbortOnError, Change, ChangeContext, ChangeError, ChangeErrorHandler, ChangeState,
    CompositeChange, ContinueOnError, ErrorDecision, MoveFileChange, NullChange, TextFileChange,
};
pub use element::{resolve_in_source, ElementKind, ElementRef};
pub use model::{ElementModel, FsModel, MemoryModel, ModelError};
pub use perform::{perform_change, PerformOutcome};
pub use preview::{generate_preview, FileChangeKind, FilePreview, RefactoringPreview};
pub use refactoring::{
    ProceedPolicy, RefactorError, Refactoring, RefactoringKind, RefactoringSession, RunOutcome,
    Stage,
};
pub use scanner::{scan, MatchCategory, RefactoringScanner, ScanFlags, ScanMatch, ScanResult};
pub use status::{RefactoringStatus, Severity, StatusEntry};
pub use undo::{SharedUndoStack, UndoEntry, UndoStack, DEFAULT_UNDO_LIMIT};

pub use extract_temp::ExtractTemp;
pub use inline_temp::InlineTemp;
pub use promote_temp::{InitializeIn, PromoteTempToField, Visibility};
pub use rename_package::RenamePackage;
pub use rename_parameters::RenameParameters;
pub use rename_temp::RenameTemp;
pub use reorder_parameters::ReorderParameters;
pub use self_encapsulate::SelfEncapsulateField;
