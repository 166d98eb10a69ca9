use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange, TextSize};
use refract_syntax::{is_java_identifier_part, MethodDecl};

use crate::change::Change;
use crate::model::ElementModel;
use crate::names::check_variable_name;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::reorder_parameters::{method_by_name_range, selected_method};
use crate::scanner::ScanFlags;
use crate::status::RefactoringStatus;
use crate::support::{textual_match_edits, variable_references, writable_status, SourceUnit, Variable};

#[derive(Clone, Debug)]
struct Target {
    method_name: String,
    name_range: TextRange,
    old_names: Vec<String>,
}

/// Renames any subset of a method's parameters, their references and `@param` tags.
pub struct RenameParameters {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    new_names: BTreeMap<usize, String>,
    update_textual_matches: bool,
    textual_flags: ScanFlags,
    target: Option<Target>,
}

impl RenameParameters {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            new_names: BTreeMap::new(),
            update_textual_matches: false,
            textual_flags: ScanFlags::default(),
            target: None,
        }
    }

    /// Rename the parameter at `index`.
    pub fn set_new_name(&mut self, index: usize, name: impl Into<String>) {
        self.new_names.insert(index, name.into());
    }

    pub fn set_update_textual_matches(&mut self, on: bool) {
        self.update_textual_matches = on;
    }

    /// Regions searched for textual matches.
    pub fn set_textual_scan_flags(&mut self, flags: ScanFlags) {
        self.textual_flags = flags;
    }

    /// Current parameter names; available after `check_activation`.
    pub fn parameter_names(&self) -> &[String] {
        self.target.as_ref().map_or(&[], |t| t.old_names.as_slice())
    }

    fn target(&self) -> Result<&Target, RefactorError> {
        self.target
            .as_ref()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }

    /// Final names of all parameters.
    fn final_names(&self, target: &Target) -> Vec<String> {
        target
            .old_names
            .iter()
            .enumerate()
            .map(|(i, old)| self.new_names.get(&i).cloned().unwrap_or_else(|| old.clone()))
            .collect()
    }
}

/// Ranges of the names following `@param` tags for `name` in the Javadoc `doc`.
fn param_tag_ranges(text: &str, doc: TextRange, name: &str) -> Vec<TextRange> {
    let doc_text = &text[doc];
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(pos) = doc_text[from..].find("@param") {
        let tag_end = from + pos + "@param".len();
        let rest = &doc_text[tag_end..];
        let skipped = rest.len() - rest.trim_start().len();
        let name_start = tag_end + skipped;
        if doc_text[name_start..].starts_with(name)
            && !doc_text[name_start + name.len()..]
                .chars()
                .next()
                .is_some_and(is_java_identifier_part)
            && skipped > 0
        {
            let start = doc.start() + TextSize::from(name_start as u32);
            out.push(TextRange::at(start, TextSize::from(name.len() as u32)));
        }
        from = tag_end;
    }
    out
}

fn rename_edits(unit: &SourceUnit, method: &MethodDecl, old: &str, new: &str, index: usize) -> Vec<TextEdit> {
    let tokens = unit.tokens();
    let param = &method.params[index];
    let mut edits: Vec<TextEdit> = variable_references(&tokens, method, old, Variable::Param(param.name_range))
        .into_iter()
        .map(|idx| TextEdit::new(tokens.tokens[idx].range, new))
        .collect();
    if let Some(doc) = method.doc {
        edits.extend(
            param_tag_ranges(&unit.text, doc, old)
                .into_iter()
                .map(|r| TextEdit::new(r, new)),
        );
    }
    edits
}

impl Refactoring for RenameParameters {
    fn name(&self) -> String {
        match &self.target {
            Some(target) => format!("Rename parameters of `{}`", target.method_name),
            None => "Rename parameters".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::RenameParameters
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let Some((unit, name_range)) = selected_method(self.model.as_ref(), &self.file, self.selection)? else {
            return Ok(RefactoringStatus::create_fatal_error_status("Select a method or parameter."));
        };
        let Some((_, method)) = method_by_name_range(&unit.syntax, name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected method is not declared in this file.",
            ));
        };
        if method.params.is_empty() {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` has no parameters.",
                method.name
            )));
        }
        if method.body.is_none() {
            tracing::debug!(target: "refract.refactor", method = %method.name, "renaming parameters of a method without body");
        }
        self.target = Some(Target {
            method_name: method.name.clone(),
            name_range,
            old_names: method.params.iter().map(|p| p.name.clone()).collect(),
        });
        monitor.done();
        Ok(writable_status(self.model.as_ref(), &self.file))
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let target = self.target()?.clone();
        let mut status = RefactoringStatus::new();
        if let Some((&index, _)) = self.new_names.range(target.old_names.len()..).next() {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` has no parameter at index {index}.",
                target.method_name
            )));
        }
        let changed: Vec<(usize, &String)> = self
            .new_names
            .iter()
            .filter(|(i, name)| target.old_names[**i] != **name)
            .map(|(i, name)| (*i, name))
            .collect();
        if changed.is_empty() {
            return Ok(RefactoringStatus::create_fatal_error_status("No parameter was renamed."));
        }
        for (_, name) in &changed {
            status.merge(check_variable_name(name));
        }
        if status.has_fatal_error() {
            return Ok(status);
        }

        let finals = self.final_names(&target);
        let mut seen = HashSet::new();
        for name in &finals {
            if !seen.insert(name.as_str()) {
                status.add_error(format!("Two parameters would be named `{name}`."));
            }
        }

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, method)) = method_by_name_range(&unit.syntax, target.name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status("The method no longer exists."));
        };
        for (_, name) in &changed {
            if method.locals().iter().any(|l| &&l.name == name) {
                status.add_error(format!(
                    "`{}` already declares a local variable named `{name}`.",
                    method.name
                ));
            }
            if ty.field(name).is_some() {
                status.add_warning(format!("The parameter `{name}` shadows a field of `{}`.", ty.name));
            }
        }
        monitor.done();
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let target = self.target()?.clone();
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let (_, method) = method_by_name_range(&unit.syntax, target.name_range)
            .ok_or_else(|| RefactorError::NotReady("the method no longer exists".into()))?;

        let mut edits = Vec::new();
        for (&index, new) in &self.new_names {
            let old = &target.old_names[index];
            if old == new {
                continue;
            }
            edits.extend(rename_edits(&unit, method, old, new, index));
        }
        if self.update_textual_matches {
            let scope = method.doc.map_or(method.range, |doc| doc.cover(method.range));
            for (&index, new) in &self.new_names {
                let old = &target.old_names[index];
                if old != new {
                    let textual = textual_match_edits(&unit.text, scope, old, new, self.textual_flags, &edits);
                    edits.extend(textual);
                }
            }
        }
        monitor.worked(1);
        tracing::debug!(target: "refract.refactor", method = %target.method_name, edits = edits.len(), "rename parameters");
        Ok(Box::new(unit.change(self.name(), edits)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_tags_match_whole_names_only() {
        let text = "/** @param count items\n * @param counter other\n * @param  count again */";
        let doc = TextRange::up_to(TextSize::from(text.len() as u32));
        let ranges = param_tag_ranges(text, doc, "count");
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|r| &text[*r] == "count"));
    }
}
