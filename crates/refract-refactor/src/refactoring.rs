//! The staged refactoring protocol and the session that enforces it.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use refract_core::{Cancelled, EditError, FileId, ProgressMonitor, TextRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::change::{Change, ChangeContext, ChangeError};
use crate::model::{ElementModel, ModelError};
use crate::perform::{perform_change, PerformOutcome};
use crate::status::{RefactoringStatus, Severity};
use crate::undo::UndoStack;
use crate::{
    ExtractTemp, InlineTemp, PromoteTempToField, RenamePackage, RenameParameters, RenameTemp,
    ReorderParameters, SelfEncapsulateField,
};

#[derive(Debug, Error)]
pub enum RefactorError {
    #[error("cannot {operation} in stage {stage:?}")]
    IllegalStage {
        operation: &'static str,
        stage: Stage,
    },
    #[error("refactoring was aborted by a fatal precondition")]
    FatalStatus,
    #[error("refactoring is not ready: {0}")]
    NotReady(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Change(#[from] ChangeError),
    #[error(transparent)]
    Edit(#[from] EditError),
}

impl From<Cancelled> for RefactorError {
    fn from(_: Cancelled) -> Self {
        RefactorError::Cancelled
    }
}

/// The four-stage protocol every refactoring implements:
/// `check_activation`, configuration through setters, `check_input`, `create_change`.
///
/// `create_change` never mutates sources; only performing the returned change does.
pub trait Refactoring: Send {
    fn name(&self) -> String;

    fn kind(&self) -> RefactoringKind;

    /// Cheap, side-effect-free feasibility check for the constructor arguments.
    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError>;

    /// Full validation of the current configuration.
    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError>;

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefactoringKind {
    RenameTemp,
    ExtractTemp,
    InlineTemp,
    #[serde(rename = "promote-temp")]
    PromoteTempToField,
    ReorderParameters,
    RenameParameters,
    RenamePackage,
    #[serde(rename = "self-encapsulate")]
    SelfEncapsulateField,
}

impl RefactoringKind {
    pub const ALL: [RefactoringKind; 8] = [
        RefactoringKind::RenameTemp,
        RefactoringKind::ExtractTemp,
        RefactoringKind::InlineTemp,
        RefactoringKind::PromoteTempToField,
        RefactoringKind::ReorderParameters,
        RefactoringKind::RenameParameters,
        RefactoringKind::RenamePackage,
        RefactoringKind::SelfEncapsulateField,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RefactoringKind::RenameTemp => "rename-temp",
            RefactoringKind::ExtractTemp => "extract-temp",
            RefactoringKind::InlineTemp => "inline-temp",
            RefactoringKind::PromoteTempToField => "promote-temp",
            RefactoringKind::ReorderParameters => "reorder-parameters",
            RefactoringKind::RenameParameters => "rename-parameters",
            RefactoringKind::RenamePackage => "rename-package",
            RefactoringKind::SelfEncapsulateField => "self-encapsulate",
        }
    }

    /// A refactoring of this kind for the element selected by `selection` in `file`.
    pub fn create(
        self,
        model: Arc<dyn ElementModel>,
        file: FileId,
        selection: TextRange,
    ) -> Box<dyn Refactoring> {
        match self {
            RefactoringKind::RenameTemp => Box::new(RenameTemp::new(model, file, selection)),
            RefactoringKind::ExtractTemp => Box::new(ExtractTemp::new(model, file, selection)),
            RefactoringKind::InlineTemp => Box::new(InlineTemp::new(model, file, selection)),
            RefactoringKind::PromoteTempToField => {
                Box::new(PromoteTempToField::new(model, file, selection))
            }
            RefactoringKind::ReorderParameters => {
                Box::new(ReorderParameters::new(model, file, selection))
            }
            RefactoringKind::RenameParameters => {
                Box::new(RenameParameters::new(model, file, selection))
            }
            RefactoringKind::RenamePackage => Box::new(RenamePackage::new(model, file, selection)),
            RefactoringKind::SelfEncapsulateField => {
                Box::new(SelfEncapsulateField::new(model, file, selection))
            }
        }
    }
}

impl fmt::Display for RefactoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefactoringKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RefactoringKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown refactoring `{s}`"))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Created,
    ActivationChecked,
    InputChecked,
    ChangeCreated,
    /// A stage returned a FATAL status; nothing else may run.
    Aborted,
}

/// Which findings still let [`RefactoringSession::run`] proceed. FATAL never does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProceedPolicy {
    /// Only `OK` and `INFO`.
    #[default]
    OnlyOk,
    AllowWarnings,
    AllowErrors,
}

impl ProceedPolicy {
    pub fn allows(self, status: &RefactoringStatus) -> bool {
        let max = match self {
            ProceedPolicy::OnlyOk => Severity::Info,
            ProceedPolicy::AllowWarnings => Severity::Warning,
            ProceedPolicy::AllowErrors => Severity::Error,
        };
        status.severity() <= max
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The change was performed and its undo pushed; carries the merged status.
    Performed(RefactoringStatus),
    /// A stage produced findings the policy does not accept. Nothing was changed.
    Blocked(RefactoringStatus),
    Cancelled,
}

/// Drives one refactoring through its stages in order.
pub struct RefactoringSession<R: Refactoring + ?Sized = dyn Refactoring> {
    stage: Stage,
    refactoring: Box<R>,
}

impl<R: Refactoring + ?Sized> fmt::Debug for RefactoringSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefactoringSession")
            .field("refactoring", &self.refactoring.name())
            .field("stage", &self.stage)
            .finish()
    }
}

impl<R: Refactoring + ?Sized> RefactoringSession<R> {
    pub fn new(refactoring: Box<R>) -> Self {
        Self {
            stage: Stage::Created,
            refactoring,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn refactoring(&self) -> &R {
        &self.refactoring
    }

    /// Access for configuration. Reconfiguring after `check_input` requires checking input
    /// again.
    pub fn refactoring_mut(&mut self) -> Result<&mut R, RefactorError> {
        match self.stage {
            Stage::Created | Stage::ActivationChecked => {}
            Stage::InputChecked => self.stage = Stage::ActivationChecked,
            Stage::Aborted => return Err(RefactorError::FatalStatus),
            stage => {
                return Err(RefactorError::IllegalStage {
                    operation: "configure",
                    stage,
                })
            }
        }
        Ok(&mut self.refactoring)
    }

    fn transition(&mut self, status: &RefactoringStatus, next: Stage) {
        self.stage = if status.has_fatal_error() {
            Stage::Aborted
        } else {
            next
        };
        tracing::debug!(
            target: "refract.refactor",
            refactoring = %self.refactoring.name(),
            stage = ?self.stage,
            severity = %status.severity(),
            "stage finished"
        );
    }

    pub fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        match self.stage {
            Stage::Created => {}
            Stage::Aborted => return Err(RefactorError::FatalStatus),
            stage => {
                return Err(RefactorError::IllegalStage {
                    operation: "check activation",
                    stage,
                })
            }
        }
        monitor.check_cancelled()?;
        let status = self.refactoring.check_activation(monitor)?;
        self.transition(&status, Stage::ActivationChecked);
        Ok(status)
    }

    pub fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        match self.stage {
            Stage::ActivationChecked | Stage::InputChecked => {}
            Stage::Aborted => return Err(RefactorError::FatalStatus),
            stage => {
                return Err(RefactorError::IllegalStage {
                    operation: "check input",
                    stage,
                })
            }
        }
        monitor.check_cancelled()?;
        let status = self.refactoring.check_input(monitor)?;
        self.transition(&status, Stage::InputChecked);
        Ok(status)
    }

    pub fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        match self.stage {
            Stage::InputChecked => {}
            Stage::Aborted => return Err(RefactorError::FatalStatus),
            stage => {
                return Err(RefactorError::IllegalStage {
                    operation: "create the change",
                    stage,
                })
            }
        }
        monitor.check_cancelled()?;
        let change = self.refactoring.create_change(monitor)?;
        self.stage = Stage::ChangeCreated;
        tracing::debug!(target: "refract.refactor", refactoring = %self.refactoring.name(), change = %change.name(), "change created");
        Ok(change)
    }

    /// Run the remaining stages and perform the change.
    ///
    /// Configuration must happen before calling this; guessed defaults from
    /// `check_activation` are used otherwise.
    pub fn run(
        &mut self,
        ctx: &mut ChangeContext<'_>,
        undo: &mut UndoStack,
        monitor: &ProgressMonitor,
        policy: ProceedPolicy,
    ) -> Result<RunOutcome, RefactorError> {
        let mut status = RefactoringStatus::new();
        macro_rules! stage {
            ($call:expr) => {
                match $call {
                    Ok(stage_status) => {
                        status.merge(stage_status);
                        if status.has_fatal_error() || !policy.allows(&status) {
                            return Ok(RunOutcome::Blocked(status));
                        }
                    }
                    Err(RefactorError::Cancelled) => return Ok(RunOutcome::Cancelled),
                    Err(err) => return Err(err),
                }
            };
        }

        if self.stage == Stage::Created {
            stage!(self.check_activation(monitor));
        }
        stage!(self.check_input(monitor));
        let change = match self.create_change(monitor) {
            Ok(change) => change,
            Err(RefactorError::Cancelled) => return Ok(RunOutcome::Cancelled),
            Err(err) => return Err(err),
        };
        match perform_change(change, ctx, undo, monitor)? {
            PerformOutcome::Performed => Ok(RunOutcome::Performed(status)),
            PerformOutcome::Cancelled => Ok(RunOutcome::Cancelled),
        }
    }
}

impl RefactoringSession<dyn Refactoring> {
    /// Configure a boxed refactoring through its concrete type.
    pub fn configure<T: Refactoring + 'static>(
        &mut self,
        configure: impl FnOnce(&mut T),
    ) -> Result<(), RefactorError> {
        let refactoring = self.refactoring_mut()?;
        let kind = refactoring.kind();
        let concrete = refactoring
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| RefactorError::NotReady(format!("session does not hold a `{kind}` of that type")))?;
        configure(concrete);
        Ok(())
    }
}
