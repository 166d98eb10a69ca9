use std::any::Any;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange};

use crate::change::Change;
use crate::element::ElementKind;
use crate::model::ElementModel;
use crate::names::check_variable_name;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::scanner::ScanFlags;
use crate::status::RefactoringStatus;
use crate::support::{
    binding_at, textual_match_edits, variable_references, writable_status, SourceUnit, Variable,
};

#[derive(Clone, Debug)]
struct Target {
    name: String,
    variable: Variable,
    /// Range of the enclosing method.
    method_range: TextRange,
}

/// Renames a local variable or parameter and all its references inside the declaring method.
pub struct RenameTemp {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    new_name: String,
    update_textual_matches: bool,
    textual_flags: ScanFlags,
    target: Option<Target>,
}

impl RenameTemp {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            new_name: String::new(),
            update_textual_matches: false,
            textual_flags: ScanFlags::default(),
            target: None,
        }
    }

    pub fn set_new_name(&mut self, name: impl Into<String>) {
        self.new_name = name.into();
    }

    pub fn new_name(&self) -> &str {
        &self.new_name
    }

    /// Also rename whole-word occurrences in comments and strings of the method.
    pub fn set_update_textual_matches(&mut self, on: bool) {
        self.update_textual_matches = on;
    }

    /// Regions searched for textual matches.
    pub fn set_textual_scan_flags(&mut self, flags: ScanFlags) {
        self.textual_flags = flags;
    }

    pub fn current_name(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.name.as_str())
    }

    fn target(&self) -> Result<&Target, RefactorError> {
        self.target
            .as_ref()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }
}

impl Refactoring for RenameTemp {
    fn name(&self) -> String {
        match &self.target {
            Some(target) => format!("Rename local variable `{}`", target.name),
            None => "Rename local variable".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::RenameTemp
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let element = match self.model.resolve_element_at(&self.file, self.selection) {
            Ok(element) => element,
            Err(_) => {
                return Ok(RefactoringStatus::create_fatal_error_status(
                    "Select a local variable or parameter.",
                ))
            }
        };
        if !matches!(element.kind, ElementKind::LocalVariable | ElementKind::Parameter) {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "Select a local variable or parameter.",
            ));
        }

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((_, method)) = unit.syntax.method_at(element.range.start()) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The variable is not declared in a method.",
            ));
        };
        let Some(variable) = binding_at(method, &element.name, element.range.start()) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected variable cannot be resolved.",
            ));
        };

        if self.new_name.is_empty() {
            self.new_name = element.name.clone();
        }
        self.target = Some(Target {
            name: element.name,
            variable,
            method_range: method.range,
        });
        monitor.done();
        Ok(writable_status(self.model.as_ref(), &self.file))
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let target = self.target()?.clone();
        monitor.begin_task("Checking new name", 1);

        let mut status = check_variable_name(&self.new_name);
        if status.has_fatal_error() {
            return Ok(status);
        }
        if self.new_name == target.name {
            status.add_fatal_error("Choose a new name.");
            return Ok(status);
        }

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, method)) = unit.syntax.method_at(target.method_range.start()) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The declaring method no longer exists.",
            ));
        };
        let tokens = unit.tokens();
        let refs = variable_references(&tokens, method, &target.name, target.variable);

        // Any reference must not be captured by another variable of the new name.
        let captured = refs.iter().any(|&idx| {
            let offset = tokens.tokens[idx].range.start();
            binding_at(method, &self.new_name, offset).is_some()
        });
        let target_scope = match target.variable {
            Variable::Local(range) => method
                .locals()
                .into_iter()
                .find(|l| l.name_range == range)
                .map(|l| l.scope),
            Variable::Param(_) => Some(method.range),
        };
        let declared_in_scope = method
            .locals()
            .into_iter()
            .filter(|l| l.name == self.new_name)
            .any(|l| {
                target_scope.is_some_and(|scope| scope.contains(l.name_range.start()))
                    || refs.iter().any(|&idx| l.scope.contains(tokens.tokens[idx].range.start()))
            });
        if captured || declared_in_scope {
            status.add_error(format!(
                "A variable named `{}` is already visible in the scope of `{}`.",
                self.new_name, target.name
            ));
        }
        if ty.field(&self.new_name).is_some() {
            status.add_warning(format!(
                "The renamed variable shadows field `{}` of `{}`.",
                self.new_name, ty.name
            ));
        }
        monitor.done();
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let target = self.target()?.clone();
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((_, method)) = unit.syntax.method_at(target.method_range.start()) else {
            return Err(RefactorError::NotReady("the declaring method no longer exists".into()));
        };
        let tokens = unit.tokens();
        let mut edits: Vec<TextEdit> = variable_references(&tokens, method, &target.name, target.variable)
            .into_iter()
            .map(|idx| TextEdit::new(tokens.tokens[idx].range, self.new_name.clone()))
            .collect();
        if self.update_textual_matches {
            let textual = textual_match_edits(&unit.text, method.range, &target.name, &self.new_name, self.textual_flags, &edits);
            edits.extend(textual);
        }
        monitor.worked(1);
        tracing::debug!(target: "refract.refactor", from = %target.name, to = %self.new_name, edits = edits.len(), "rename temp");
        Ok(Box::new(unit.change(self.name(), edits)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
