//! Reversible source mutations.
//!
//! A change goes through `Created -> AboutToPerform -> Performed -> Released`. `perform` may be
//! called once; `performed` must follow it exactly once, whether `perform` succeeded or not.
//! The inverse change is built while performing and handed out by `undo_change`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use refract_core::{apply_text_edits, invert_text_edits, Cancelled, EditError, FileId, ProgressMonitor, TextEdit};
use thiserror::Error;

use crate::model::{ElementModel, ModelError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChangeState {
    #[default]
    Created,
    AboutToPerform,
    Performed,
    Released,
}

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("cannot {operation} change `{name}` in state {state:?}")]
    IllegalState {
        name: String,
        operation: &'static str,
        state: ChangeState,
    },
    #[error("change `{name}` aborted: {reason}")]
    Aborted { name: String, reason: String },
    #[error("`{0}` was modified after the change was created")]
    Modified(FileId),
    #[error("change `{0}` has no undo change")]
    NoUndo(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for ChangeError {
    fn from(_: Cancelled) -> Self {
        ChangeError::Cancelled
    }
}

impl ChangeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChangeError::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorDecision {
    Continue,
    Abort,
}

/// Decides what happens when a change hits a recoverable fault while performing.
pub trait ChangeErrorHandler: Send {
    fn handle(&mut self, change: &str, error: &ChangeError) -> ErrorDecision;

    /// Faults that were skipped with [`ErrorDecision::Continue`].
    fn skipped(&self) -> &[String] {
        &[]
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AbortOnError;

impl ChangeErrorHandler for AbortOnError {
    fn handle(&mut self, _change: &str, _error: &ChangeError) -> ErrorDecision {
        ErrorDecision::Abort
    }
}

/// Best-effort handler: records each fault and keeps going.
#[derive(Clone, Debug, Default)]
pub struct ContinueOnError {
    skipped: Vec<String>,
}

impl ChangeErrorHandler for ContinueOnError {
    fn handle(&mut self, change: &str, error: &ChangeError) -> ErrorDecision {
        self.skipped.push(format!("{change}: {error}"));
        ErrorDecision::Continue
    }

    fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

/// The model a change mutates plus the fault handler consulted during `perform`.
pub struct ChangeContext<'a> {
    model: &'a dyn ElementModel,
    error_handler: Box<dyn ChangeErrorHandler + 'a>,
}

impl<'a> ChangeContext<'a> {
    pub fn new(model: &'a dyn ElementModel) -> Self {
        Self::with_handler(model, AbortOnError)
    }

    pub fn with_handler(model: &'a dyn ElementModel, handler: impl ChangeErrorHandler + 'a) -> Self {
        Self {
            model,
            error_handler: Box::new(handler),
        }
    }

    pub fn model(&self) -> &'a dyn ElementModel {
        self.model
    }

    pub fn handle_error(&mut self, change: &str, error: &ChangeError) -> ErrorDecision {
        let decision = self.error_handler.handle(change, error);
        tracing::debug!(target: "refract.change", change, %error, ?decision, "change fault");
        decision
    }

    pub fn skipped(&self) -> &[String] {
        self.error_handler.skipped()
    }
}

impl fmt::Debug for ChangeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeContext")
            .field("skipped", &self.skipped())
            .finish_non_exhaustive()
    }
}

pub trait Change: fmt::Debug + Send {
    fn name(&self) -> String;

    fn is_undoable(&self) -> bool {
        true
    }

    fn state(&self) -> ChangeState;

    /// Last-minute validation before the first `perform`. Unrecoverable anomalies (a deleted
    /// resource) are errors; anything else goes through the context's error handler.
    fn about_to_perform(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        monitor: &ProgressMonitor,
    ) -> Result<(), ChangeError>;

    fn perform(&mut self, ctx: &mut ChangeContext<'_>, monitor: &ProgressMonitor) -> Result<(), ChangeError>;

    /// Release resources held since `perform`. Must be called exactly once after `perform`.
    fn performed(&mut self) -> Result<(), ChangeError>;

    /// The change restoring the state before `perform`. Only valid once `perform` returned;
    /// a [`NullChange`] when the change is not undoable.
    fn undo_change(&mut self) -> Result<Box<dyn Change>, ChangeError>;

    /// Apply the change to an in-memory snapshot without touching the model.
    fn apply_to_snapshot(&self, files: &mut BTreeMap<FileId, String>) -> Result<(), ChangeError>;

    fn children(&self) -> &[Box<dyn Change>] {
        &[]
    }

    fn affected_files(&self) -> Vec<FileId>;

    fn file_moves(&self) -> Vec<(FileId, FileId)> {
        Vec::new()
    }

    fn edit_count(&self, file: &FileId) -> usize {
        let _ = file;
        0
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: ChangeState,
}

impl Lifecycle {
    fn illegal(&self, name: String, operation: &'static str) -> ChangeError {
        ChangeError::IllegalState {
            name,
            operation,
            state: self.state,
        }
    }

    /// Preparing may be repeated until the change performs, so a failed check can be retried.
    fn about_to_perform(&mut self, name: impl FnOnce() -> String) -> Result<(), ChangeError> {
        match self.state {
            ChangeState::Created | ChangeState::AboutToPerform => {
                self.state = ChangeState::AboutToPerform;
                Ok(())
            }
            _ => Err(self.illegal(name(), "prepare")),
        }
    }

    fn begin_perform(&mut self, name: impl FnOnce() -> String) -> Result<(), ChangeError> {
        match self.state {
            ChangeState::Created | ChangeState::AboutToPerform => {
                self.state = ChangeState::Performed;
                Ok(())
            }
            _ => Err(self.illegal(name(), "perform")),
        }
    }

    fn performed(&mut self, name: impl FnOnce() -> String) -> Result<(), ChangeError> {
        match self.state {
            ChangeState::Performed => {
                self.state = ChangeState::Released;
                Ok(())
            }
            _ => Err(self.illegal(name(), "release")),
        }
    }

    fn require_performed(&self, name: impl FnOnce() -> String) -> Result<(), ChangeError> {
        match self.state {
            ChangeState::Performed | ChangeState::Released => Ok(()),
            _ => Err(self.illegal(name(), "create the undo change of")),
        }
    }
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Edits to a single file.
#[derive(Debug)]
pub struct TextFileChange {
    name: String,
    file: FileId,
    edits: Vec<TextEdit>,
    fingerprint: Option<u64>,
    lifecycle: Lifecycle,
    undo: Option<Box<dyn Change>>,
}

impl TextFileChange {
    pub fn new(name: impl Into<String>, file: FileId, edits: Vec<TextEdit>) -> Self {
        Self {
            name: name.into(),
            file,
            edits,
            fingerprint: None,
            lifecycle: Lifecycle::default(),
            undo: None,
        }
    }

    /// Remember `source` as the text the edits were computed against.
    pub fn with_fingerprint(mut self, source: &str) -> Self {
        self.fingerprint = Some(fingerprint(source));
        self
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    fn is_stale(&self, text: &str) -> bool {
        self.fingerprint.is_some_and(|expected| expected != fingerprint(text))
    }

    fn check_source(&self, ctx: &mut ChangeContext<'_>, text: &str) -> Result<(), ChangeError> {
        if self.is_stale(text) {
            let error = ChangeError::Modified(self.file.clone());
            if ctx.handle_error(&self.name, &error) == ErrorDecision::Abort {
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Change for TextFileChange {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn state(&self) -> ChangeState {
        self.lifecycle.state
    }

    fn about_to_perform(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        _monitor: &ProgressMonitor,
    ) -> Result<(), ChangeError> {
        self.lifecycle.about_to_perform(|| self.name.clone())?;
        if !ctx.model().exists(&self.file) {
            return Err(ChangeError::Aborted {
                name: self.name.clone(),
                reason: format!("`{}` no longer exists", self.file),
            });
        }
        if !ctx.model().exists_and_writable(&self.file) {
            let error = ChangeError::Model(ModelError::ReadOnly(self.file.clone()));
            if ctx.handle_error(&self.name, &error) == ErrorDecision::Abort {
                return Err(error);
            }
        }
        let text = ctx.model().read_source(&self.file)?;
        self.check_source(ctx, &text)
    }

    fn perform(&mut self, ctx: &mut ChangeContext<'_>, monitor: &ProgressMonitor) -> Result<(), ChangeError> {
        let prepared = self.lifecycle.state == ChangeState::AboutToPerform;
        self.lifecycle.begin_perform(|| self.name.clone())?;
        monitor.check_cancelled()?;

        let text = ctx.model().read_source(&self.file)?;
        // Unprepared changes report a stale source to their caller, which decides once.
        if !prepared && self.is_stale(&text) {
            return Err(ChangeError::Modified(self.file.clone()));
        }
        let new_text = apply_text_edits(&text, &self.edits)?;
        let inverse = invert_text_edits(&text, &self.edits)?;
        ctx.model().write_source(&self.file, new_text.clone())?;
        tracing::debug!(target: "refract.change", change = %self.name, file = %self.file, edits = self.edits.len(), "performed text change");

        self.undo = Some(Box::new(
            TextFileChange::new(format!("Undo {}", self.name), self.file.clone(), inverse)
                .with_fingerprint(&new_text),
        ));
        monitor.worked(1);
        Ok(())
    }

    fn performed(&mut self) -> Result<(), ChangeError> {
        self.lifecycle.performed(|| self.name.clone())
    }

    fn undo_change(&mut self) -> Result<Box<dyn Change>, ChangeError> {
        self.lifecycle.require_performed(|| self.name.clone())?;
        self.undo
            .take()
            .ok_or_else(|| ChangeError::NoUndo(self.name.clone()))
    }

    fn apply_to_snapshot(&self, files: &mut BTreeMap<FileId, String>) -> Result<(), ChangeError> {
        let text = files
            .get(&self.file)
            .ok_or_else(|| ModelError::NotFound(self.file.clone()))?;
        let new_text = apply_text_edits(text, &self.edits)?;
        files.insert(self.file.clone(), new_text);
        Ok(())
    }

    fn affected_files(&self) -> Vec<FileId> {
        vec![self.file.clone()]
    }

    fn edit_count(&self, file: &FileId) -> usize {
        if *file == self.file {
            self.edits.len()
        } else {
            0
        }
    }
}

/// Moves (renames) a file.
#[derive(Debug)]
pub struct MoveFileChange {
    from: FileId,
    to: FileId,
    lifecycle: Lifecycle,
    undo: Option<Box<dyn Change>>,
}

impl MoveFileChange {
    pub fn new(from: FileId, to: FileId) -> Self {
        Self {
            from,
            to,
            lifecycle: Lifecycle::default(),
            undo: None,
        }
    }

    pub fn from(&self) -> &FileId {
        &self.from
    }

    pub fn to(&self) -> &FileId {
        &self.to
    }
}

impl Change for MoveFileChange {
    fn name(&self) -> String {
        format!("Move `{}` to `{}`", self.from, self.to)
    }

    fn state(&self) -> ChangeState {
        self.lifecycle.state
    }

    fn about_to_perform(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        _monitor: &ProgressMonitor,
    ) -> Result<(), ChangeError> {
        let name = self.name();
        self.lifecycle.about_to_perform(|| name.clone())?;
        if !ctx.model().exists(&self.from) {
            return Err(ChangeError::Aborted {
                name,
                reason: format!("`{}` no longer exists", self.from),
            });
        }
        if ctx.model().exists(&self.to) {
            let error = ChangeError::Model(ModelError::AlreadyExists(self.to.clone()));
            if ctx.handle_error(&name, &error) == ErrorDecision::Abort {
                return Err(error);
            }
        }
        Ok(())
    }

    fn perform(&mut self, ctx: &mut ChangeContext<'_>, monitor: &ProgressMonitor) -> Result<(), ChangeError> {
        let name = self.name();
        self.lifecycle.begin_perform(|| name)?;
        monitor.check_cancelled()?;
        ctx.model().rename_file(&self.from, &self.to)?;
        tracing::debug!(target: "refract.change", from = %self.from, to = %self.to, "moved file");
        self.undo = Some(Box::new(MoveFileChange::new(self.to.clone(), self.from.clone())));
        monitor.worked(1);
        Ok(())
    }

    fn performed(&mut self) -> Result<(), ChangeError> {
        let name = self.name();
        self.lifecycle.performed(|| name)
    }

    fn undo_change(&mut self) -> Result<Box<dyn Change>, ChangeError> {
        let name = self.name();
        self.lifecycle.require_performed(|| name.clone())?;
        self.undo.take().ok_or(ChangeError::NoUndo(name))
    }

    fn apply_to_snapshot(&self, files: &mut BTreeMap<FileId, String>) -> Result<(), ChangeError> {
        if files.contains_key(&self.to) {
            return Err(ModelError::AlreadyExists(self.to.clone()).into());
        }
        let text = files
            .remove(&self.from)
            .ok_or_else(|| ModelError::NotFound(self.from.clone()))?;
        files.insert(self.to.clone(), text);
        Ok(())
    }

    fn affected_files(&self) -> Vec<FileId> {
        vec![self.from.clone()]
    }

    fn file_moves(&self) -> Vec<(FileId, FileId)> {
        vec![(self.from.clone(), self.to.clone())]
    }
}

/// Children performed in order.
///
/// A failing child does not roll back the children performed before it. The undo change
/// covers exactly the children that succeeded, so the caller can restore the previous state.
#[derive(Debug)]
pub struct CompositeChange {
    name: String,
    children: Vec<Box<dyn Change>>,
    lifecycle: Lifecycle,
    undo: Option<Box<dyn Change>>,
}

impl CompositeChange {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_children(name, Vec::new())
    }

    pub fn with_children(name: impl Into<String>, children: Vec<Box<dyn Change>>) -> Self {
        Self {
            name: name.into(),
            children,
            lifecycle: Lifecycle::default(),
            undo: None,
        }
    }

    pub fn add(&mut self, child: impl Change + 'static) {
        self.children.push(Box::new(child));
    }

    pub fn add_boxed(&mut self, child: Box<dyn Change>) {
        self.children.push(child);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Change for CompositeChange {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_undoable(&self) -> bool {
        self.children.iter().all(|c| c.is_undoable())
    }

    fn state(&self) -> ChangeState {
        self.lifecycle.state
    }

    fn about_to_perform(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        monitor: &ProgressMonitor,
    ) -> Result<(), ChangeError> {
        self.lifecycle.about_to_perform(|| self.name.clone())?;
        let mut moved_in: HashSet<FileId> = HashSet::new();
        for child in &mut self.children {
            // A file that an earlier child moves into place is validated when the child performs.
            if !child.affected_files().iter().any(|file| moved_in.contains(file)) {
                child.about_to_perform(ctx, monitor)?;
            }
            moved_in.extend(child.file_moves().into_iter().map(|(_, to)| to));
        }
        Ok(())
    }

    fn perform(&mut self, ctx: &mut ChangeContext<'_>, monitor: &ProgressMonitor) -> Result<(), ChangeError> {
        self.lifecycle.begin_perform(|| self.name.clone())?;
        monitor.begin_task(&self.name, self.children.len() as u64);

        let mut undos: Vec<Box<dyn Change>> = Vec::new();
        let mut outcome = Ok(());
        for child in &mut self.children {
            if let Err(cancelled) = monitor.check_cancelled() {
                outcome = Err(cancelled.into());
                break;
            }
            monitor.subtask(&child.name());
            let result = child.perform(ctx, monitor);
            if let Err(err) = child.performed() {
                tracing::warn!(target: "refract.change", change = %child.name(), error = %err, "release failed");
            }
            match result {
                Ok(()) => {
                    if child.is_undoable() {
                        match child.undo_change() {
                            Ok(undo) => undos.push(undo),
                            Err(err) => {
                                tracing::warn!(target: "refract.change", change = %child.name(), error = %err, "no undo change")
                            }
                        }
                    }
                }
                Err(err) if err.is_cancelled() => {
                    outcome = Err(err);
                    break;
                }
                Err(err) => {
                    if ctx.handle_error(&child.name(), &err) == ErrorDecision::Abort {
                        outcome = Err(err);
                        break;
                    }
                }
            }
        }

        if !undos.is_empty() {
            undos.reverse();
            self.undo = Some(Box::new(CompositeChange::with_children(
                format!("Undo {}", self.name),
                undos,
            )));
        }
        monitor.done();
        outcome
    }

    fn performed(&mut self) -> Result<(), ChangeError> {
        self.lifecycle.performed(|| self.name.clone())
    }

    fn undo_change(&mut self) -> Result<Box<dyn Change>, ChangeError> {
        self.lifecycle.require_performed(|| self.name.clone())?;
        if !self.is_undoable() {
            return Ok(Box::new(NullChange::new(format!("Undo {}", self.name))));
        }
        self.undo
            .take()
            .ok_or_else(|| ChangeError::NoUndo(self.name.clone()))
    }

    fn apply_to_snapshot(&self, files: &mut BTreeMap<FileId, String>) -> Result<(), ChangeError> {
        for child in &self.children {
            child.apply_to_snapshot(files)?;
        }
        Ok(())
    }

    fn children(&self) -> &[Box<dyn Change>] {
        &self.children
    }

    fn affected_files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self
            .children
            .iter()
            .flat_map(|c| c.affected_files())
            .collect();
        files.sort();
        files.dedup();
        files
    }

    fn file_moves(&self) -> Vec<(FileId, FileId)> {
        self.children.iter().flat_map(|c| c.file_moves()).collect()
    }

    fn edit_count(&self, file: &FileId) -> usize {
        self.children.iter().map(|c| c.edit_count(file)).sum()
    }
}

/// A change that does nothing and cannot be undone.
#[derive(Debug)]
pub struct NullChange {
    name: String,
    lifecycle: Lifecycle,
}

impl NullChange {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::default(),
        }
    }
}

impl Change for NullChange {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_undoable(&self) -> bool {
        false
    }

    fn state(&self) -> ChangeState {
        self.lifecycle.state
    }

    fn about_to_perform(
        &mut self,
        _ctx: &mut ChangeContext<'_>,
        _monitor: &ProgressMonitor,
    ) -> Result<(), ChangeError> {
        self.lifecycle.about_to_perform(|| self.name.clone())
    }

    fn perform(&mut self, _ctx: &mut ChangeContext<'_>, _monitor: &ProgressMonitor) -> Result<(), ChangeError> {
        self.lifecycle.begin_perform(|| self.name.clone())
    }

    fn performed(&mut self) -> Result<(), ChangeError> {
        self.lifecycle.performed(|| self.name.clone())
    }

    fn undo_change(&mut self) -> Result<Box<dyn Change>, ChangeError> {
        self.lifecycle.require_performed(|| self.name.clone())?;
        Ok(Box::new(NullChange::new(self.name.clone())))
    }

    fn apply_to_snapshot(&self, _files: &mut BTreeMap<FileId, String>) -> Result<(), ChangeError> {
        Ok(())
    }

    fn affected_files(&self) -> Vec<FileId> {
        Vec::new()
    }
}
