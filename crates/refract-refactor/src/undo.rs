use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use refract_core::ProgressMonitor;

use crate::change::{Change, ChangeContext, ChangeError};

pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// A named, performed-change inverse.
#[derive(Debug)]
pub struct UndoEntry {
    pub label: String,
    pub change: Box<dyn Change>,
}

/// Caller-owned LIFO of undo changes, with a redo list.
///
/// Hosts that share one stack across threads wrap it in a [`SharedUndoStack`].
#[derive(Debug)]
pub struct UndoStack {
    limit: usize,
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
}

pub type SharedUndoStack = Arc<Mutex<UndoStack>>;

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `limit` entries are kept; the oldest are evicted first. `0` disables undo.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedUndoStack {
        Arc::new(Mutex::new(self))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn flush(&mut self) {
        tracing::debug!(target: "refract.undo", undo = self.undo.len(), redo = self.redo.len(), "flush");
        self.undo.clear();
        self.redo.clear();
    }

    pub fn add_undo(&mut self, label: impl Into<String>, change: Box<dyn Change>) {
        let label = label.into();
        self.redo.clear();
        tracing::debug!(target: "refract.undo", %label, "push undo");
        self.push_undo(UndoEntry { label, change });
    }

    fn push_undo(&mut self, entry: UndoEntry) {
        if self.limit == 0 {
            tracing::debug!(target: "refract.undo", label = %entry.label, "undo disabled, dropping entry");
            return;
        }
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                tracing::debug!(target: "refract.undo", label = %evicted.label, "evicted oldest undo entry");
            }
        }
    }

    pub fn pop_undo(&mut self) -> Option<UndoEntry> {
        self.undo.pop_back()
    }

    pub fn peek_undo_label(&self) -> Option<&str> {
        self.undo.back().map(|e| e.label.as_str())
    }

    pub fn peek_redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }

    /// Labels from newest to oldest.
    pub fn labels(&self) -> Vec<&str> {
        self.undo.iter().rev().map(|e| e.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Perform the newest undo change; its inverse becomes redoable. Returns the label.
    ///
    /// An entry whose preparation fails stays on the stack. When it fails while performing,
    /// the inverse of the part that ran becomes redoable.
    pub fn undo(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        monitor: &ProgressMonitor,
    ) -> Result<Option<String>, ChangeError> {
        let Some(mut entry) = self.undo.pop_back() else {
            return Ok(None);
        };
        if let Err(err) = entry.change.about_to_perform(ctx, monitor) {
            tracing::warn!(target: "refract.undo", label = %entry.label, error = %err, "undo entry rejected");
            self.undo.push_back(entry);
            return Err(err);
        }
        let label = entry.label.clone();
        let (inverse, result) = run_prepared(entry, ctx, monitor);
        if let Some(change) = inverse {
            self.redo.push(UndoEntry {
                label: label.clone(),
                change,
            });
        }
        result?;
        tracing::debug!(target: "refract.undo", %label, "undone");
        Ok(Some(label))
    }

    pub fn redo(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        monitor: &ProgressMonitor,
    ) -> Result<Option<String>, ChangeError> {
        let Some(mut entry) = self.redo.pop() else {
            return Ok(None);
        };
        if let Err(err) = entry.change.about_to_perform(ctx, monitor) {
            tracing::warn!(target: "refract.undo", label = %entry.label, error = %err, "redo entry rejected");
            self.redo.push(entry);
            return Err(err);
        }
        let label = entry.label.clone();
        let (inverse, result) = run_prepared(entry, ctx, monitor);
        if let Some(change) = inverse {
            self.push_undo(UndoEntry {
                label: label.clone(),
                change,
            });
        }
        result?;
        tracing::debug!(target: "refract.undo", %label, "redone");
        Ok(Some(label))
    }
}

/// Performs a prepared entry. The inverse covers whatever ran, even when performing failed.
fn run_prepared(
    entry: UndoEntry,
    ctx: &mut ChangeContext<'_>,
    monitor: &ProgressMonitor,
) -> (Option<Box<dyn Change>>, Result<(), ChangeError>) {
    let mut change = entry.change;
    let mut result = change.perform(ctx, monitor);
    if let Err(err) = change.performed() {
        tracing::warn!(target: "refract.undo", label = %entry.label, error = %err, "release failed");
    }
    if let Err(err) = &result {
        tracing::warn!(target: "refract.undo", label = %entry.label, error = %err, "entry failed");
    }
    if !change.is_undoable() {
        return (None, result);
    }
    match change.undo_change() {
        Ok(inverse) => (Some(inverse), result),
        Err(err) => {
            if result.is_ok() {
                result = Err(err);
            }
            (None, result)
        }
    }
}
