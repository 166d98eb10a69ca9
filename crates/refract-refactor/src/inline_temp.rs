use std::any::Any;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange};
use refract_syntax::{LocalDecl, MethodDecl, TokenKind};

use crate::change::Change;
use crate::element::ElementKind;
use crate::model::ElementModel;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::status::RefactoringStatus;
use crate::support::{
    expression_precedence, is_statement_local, is_write, needs_parentheses, variable_references,
    writable_status, SourceUnit, Variable,
};
use crate::tokens::CodeTokens;

/// Replaces every reference to a local with its initializer and removes the declaration.
pub struct InlineTemp {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    /// Name range of the local's declaration.
    declaration: Option<(String, TextRange)>,
}

impl InlineTemp {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            declaration: None,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        self.declaration.as_ref().map(|(name, _)| name.as_str())
    }

    fn declaration(&self) -> Result<(String, TextRange), RefactorError> {
        self.declaration
            .clone()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }
}

fn find_local<'m>(unit: &'m SourceUnit, name_range: TextRange) -> Option<(&'m MethodDecl, &'m LocalDecl)> {
    let (_, method) = unit.syntax.method_at(name_range.start())?;
    let local = method
        .locals()
        .into_iter()
        .find(|l| l.name_range == name_range)?;
    Some((method, local))
}

/// References to `local`, declaration excluded.
fn references(tokens: &CodeTokens<'_>, method: &MethodDecl, local: &LocalDecl) -> Vec<usize> {
    variable_references(tokens, method, &local.name, Variable::Local(local.name_range))
        .into_iter()
        .filter(|&idx| tokens.tokens[idx].range != local.name_range)
        .collect()
}

/// The range removing the declarator of `local` from a multi-variable declaration, including one
/// adjacent comma.
fn declarator_removal(tokens: &CodeTokens<'_>, local: &LocalDecl) -> Option<TextRange> {
    let name_idx = tokens.index_at(local.name_range.start())?;
    let last = match local.initializer {
        Some(init) => tokens.indices_in(init).end.checked_sub(1)?,
        None => name_idx,
    };
    if tokens.next_text(last) == Some(",") {
        let next = tokens.get(last + 2)?;
        return Some(TextRange::new(local.name_range.start(), next.range.start()));
    }
    if tokens.prev_text(name_idx) == Some(",") {
        let comma = tokens.get(name_idx - 1)?;
        return Some(TextRange::new(comma.range.start(), tokens.tokens[last].range.end()));
    }
    None
}

impl Refactoring for InlineTemp {
    fn name(&self) -> String {
        match &self.declaration {
            Some((name, _)) => format!("Inline local variable `{name}`"),
            None => "Inline local variable".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::InlineTemp
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let element = match self.model.resolve_element_at(&self.file, self.selection) {
            Ok(element) if element.kind == ElementKind::LocalVariable => element,
            Ok(element) if element.kind == ElementKind::Parameter => {
                return Ok(RefactoringStatus::create_fatal_error_status(
                    "Method parameters cannot be inlined.",
                ))
            }
            _ => {
                return Ok(RefactoringStatus::create_fatal_error_status(
                    "Select a local variable declaration or reference.",
                ))
            }
        };

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((method, local)) = find_local(&unit, element.range) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected variable cannot be resolved.",
            ));
        };
        if !is_statement_local(method, local) {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is declared in a loop header, resource specification or catch clause and cannot be inlined.",
                local.name
            )));
        }
        let Some(initializer) = local.initializer else {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is not initialized at its declaration.",
                local.name
            )));
        };
        let tokens = unit.tokens();
        let refs = references(&tokens, method, local);
        if refs.iter().any(|&idx| is_write(&tokens, idx)) {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is assigned more than once.",
                local.name
            )));
        }

        let mut status = writable_status(self.model.as_ref(), &self.file);
        if refs.is_empty() {
            status.add_info(format!("`{}` is never used; only its declaration is removed.", local.name));
        }
        let has_side_effects = tokens.indices_in(initializer).any(|i| {
            tokens.text_at(i) == Some("new")
                || (tokens.is_call(i) && tokens.get(i).is_some_and(|t| t.kind == TokenKind::Identifier))
        });
        if has_side_effects && refs.len() > 1 {
            status.add_warning(format!(
                "The initializer of `{}` is evaluated {} times after inlining.",
                local.name,
                refs.len()
            ));
        }
        self.declaration = Some((local.name.clone(), local.name_range));
        monitor.done();
        Ok(status)
    }

    fn check_input(&mut self, _monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let (_, name_range) = self.declaration()?;
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        if find_local(&unit, name_range).is_none() {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The variable no longer exists.",
            ));
        }
        Ok(RefactoringStatus::new())
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let (_, name_range) = self.declaration()?;
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let (method, local) = find_local(&unit, name_range)
            .ok_or_else(|| RefactorError::NotReady("the variable no longer exists".into()))?;
        let initializer = local
            .initializer
            .ok_or_else(|| RefactorError::NotReady("the variable has no initializer".into()))?;
        let tokens = unit.tokens();

        let mut init_text = unit.text[initializer].to_string();
        if init_text.starts_with('{') {
            init_text = format!("new {} {init_text}", local.ty);
        }
        let prec = expression_precedence(&tokens, initializer);

        let mut edits = Vec::new();
        for idx in references(&tokens, method, local) {
            let replacement = if needs_parentheses(&tokens, idx, idx, prec) {
                format!("({init_text})")
            } else {
                init_text.clone()
            };
            edits.push(TextEdit::new(tokens.tokens[idx].range, replacement));
        }

        let removal = if local.multi {
            declarator_removal(&tokens, local)
                .ok_or_else(|| RefactorError::NotReady("cannot locate the declarator".into()))?
        } else {
            unit.deletion_range(local.statement_range)
        };
        edits.push(TextEdit::delete(removal));

        monitor.worked(1);
        tracing::debug!(target: "refract.refactor", name = %local.name, references = edits.len() - 1, "inline temp");
        Ok(Box::new(unit.change(self.name(), edits)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
