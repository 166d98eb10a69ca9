use refract_core::ProgressMonitor;

use crate::change::{Change, ChangeContext, ChangeError};
use crate::undo::UndoStack;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerformOutcome {
    Performed,
    /// Cancellation was observed. If it happened mid-way, the undo stack holds the inverse of
    /// whatever part of the change executed.
    Cancelled,
}

/// Run `change` through `about_to_perform`, `perform` and `performed`, then push its undo
/// change (also for a partially executed composite).
pub fn perform_change(
    mut change: Box<dyn Change>,
    ctx: &mut ChangeContext<'_>,
    undo: &mut UndoStack,
    monitor: &ProgressMonitor,
) -> Result<PerformOutcome, ChangeError> {
    let name = change.name();
    if monitor.check_cancelled().is_err() {
        return Ok(PerformOutcome::Cancelled);
    }

    change.about_to_perform(ctx, monitor)?;
    tracing::debug!(target: "refract.change", change = %name, "perform");
    let result = change.perform(ctx, monitor);
    if let Err(err) = change.performed() {
        tracing::warn!(target: "refract.change", change = %name, error = %err, "release failed");
    }

    if change.is_undoable() {
        match change.undo_change() {
            Ok(inverse) => undo.add_undo(name.clone(), inverse),
            Err(ChangeError::NoUndo(_)) => {}
            Err(err) => {
                tracing::warn!(target: "refract.change", change = %name, error = %err, "no undo change")
            }
        }
    }

    match result {
        Ok(()) => Ok(PerformOutcome::Performed),
        Err(err) if err.is_cancelled() => {
            tracing::debug!(target: "refract.change", change = %name, "cancelled while performing");
            Ok(PerformOutcome::Cancelled)
        }
        Err(err) => {
            tracing::warn!(target: "refract.change", change = %name, error = %err, "perform failed");
            Err(err)
        }
    }
}
