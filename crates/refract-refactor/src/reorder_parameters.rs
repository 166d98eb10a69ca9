use std::any::Any;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange};
use refract_syntax::{MethodDecl, SourceFile, TypeDecl};

use crate::change::{Change, CompositeChange};
use crate::element::ElementKind;
use crate::model::ElementModel;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::status::RefactoringStatus;
use crate::support::{render_range, writable_status, SourceUnit};
use crate::tokens::CodeTokens;

#[derive(Clone, Debug)]
struct Target {
    type_name: String,
    method_name: String,
    name_range: TextRange,
    param_types: Vec<String>,
    param_names: Vec<String>,
}

/// Permutes the parameters of a method and the arguments of every call to it.
pub struct ReorderParameters {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    new_order: Vec<usize>,
    target: Option<Target>,
}

impl ReorderParameters {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            new_order: Vec::new(),
            target: None,
        }
    }

    /// `order[i]` is the old index of the parameter at new position `i`.
    pub fn set_new_order(&mut self, order: Vec<usize>) {
        self.new_order = order;
    }

    pub fn new_order(&self) -> &[usize] {
        &self.new_order
    }

    pub fn parameter_names(&self) -> &[String] {
        self.target.as_ref().map_or(&[], |t| t.param_names.as_slice())
    }

    fn target(&self) -> Result<&Target, RefactorError> {
        self.target
            .as_ref()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }
}

pub(crate) fn method_by_name_range(syntax: &SourceFile, name_range: TextRange) -> Option<(&TypeDecl, &MethodDecl)> {
    syntax.all_types().into_iter().find_map(|ty| {
        ty.methods
            .iter()
            .find(|m| m.name_range == name_range)
            .map(|m| (ty, m))
    })
}

/// The method a selection designates: its name, a call of it, or one of its parameters.
pub(crate) fn selected_method(
    model: &dyn ElementModel,
    file: &FileId,
    selection: TextRange,
) -> Result<Option<(SourceUnit, TextRange)>, RefactorError> {
    let Ok(element) = model.resolve_element_at(file, selection) else {
        return Ok(None);
    };
    let unit = SourceUnit::load(model, file)?;
    let name_range = match element.kind {
        ElementKind::Method => Some(element.range),
        ElementKind::Parameter => unit
            .syntax
            .method_at(element.range.start())
            .map(|(_, m)| m.name_range),
        _ => None,
    };
    Ok(name_range.map(|range| (unit, range)))
}

/// A call with its argument list.
#[derive(Clone, Debug)]
struct Call {
    name: TextRange,
    open: TextRange,
    close: TextRange,
    args: Vec<TextRange>,
}

impl Call {
    fn contains(&self, other: &Call) -> bool {
        self.open.start() < other.name.start() && other.close.end() <= self.close.start()
    }
}

/// Calls of `name` with `arity` arguments, method declarations excluded.
fn find_calls(unit: &SourceUnit, tokens: &CodeTokens<'_>, name: &str, arity: usize) -> Vec<Call> {
    let declarations: Vec<TextRange> = unit
        .syntax
        .all_types()
        .into_iter()
        .flat_map(|ty| ty.methods.iter().map(|m| m.name_range))
        .collect();
    (0..tokens.tokens.len())
        .filter(|&idx| tokens.is_ident(idx, name) && tokens.is_call(idx))
        .filter(|&idx| !declarations.contains(&tokens.tokens[idx].range))
        .filter_map(|idx| {
            let close = tokens.matching_close(idx + 1)?;
            let args = tokens.split_args(idx + 1, close);
            (args.len() == arity).then(|| Call {
                name: tokens.tokens[idx].range,
                open: tokens.tokens[idx + 1].range,
                close: tokens.tokens[close].range,
                args,
            })
        })
        .collect()
}

struct CallRewriter<'a> {
    text: &'a str,
    calls: &'a [Call],
    order: &'a [usize],
}

impl CallRewriter<'_> {
    /// Text of `range` with every matched call inside it reordered.
    fn render(&self, range: TextRange) -> String {
        let inner: Vec<&Call> = self
            .calls
            .iter()
            .filter(|c| range.contains_range(TextRange::new(c.name.start(), c.close.end())))
            .collect();
        let outermost: Vec<(TextRange, String)> = inner
            .iter()
            .filter(|c| !inner.iter().any(|o| o.contains(c)))
            .map(|c| (TextRange::new(c.open.end(), c.close.start()), self.arguments(c)))
            .collect();
        render_range(self.text, range, &outermost)
    }

    /// The reordered argument list of `call`, keeping the original separators in place.
    fn arguments(&self, call: &Call) -> String {
        let mut out = String::new();
        for (position, &old) in self.order.iter().enumerate() {
            if let Some(arg) = call.args.get(old) {
                out.push_str(&self.render(*arg));
            }
            if let (Some(left), Some(right)) = (call.args.get(position), call.args.get(position + 1)) {
                out.push_str(&self.text[TextRange::new(left.end(), right.start())]);
            }
        }
        let (Some(first), Some(last)) = (call.args.first(), call.args.last()) else {
            return self.text[TextRange::new(call.open.end(), call.close.start())].to_string();
        };
        format!(
            "{}{out}{}",
            &self.text[TextRange::new(call.open.end(), first.start())],
            &self.text[TextRange::new(last.end(), call.close.start())]
        )
    }
}

impl Refactoring for ReorderParameters {
    fn name(&self) -> String {
        match &self.target {
            Some(target) => format!("Reorder parameters of `{}.{}`", target.type_name, target.method_name),
            None => "Reorder parameters".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ReorderParameters
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let Some((unit, name_range)) = selected_method(self.model.as_ref(), &self.file, self.selection)? else {
            return Ok(RefactoringStatus::create_fatal_error_status("Select a method."));
        };
        let Some((ty, method)) = method_by_name_range(&unit.syntax, name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected method is not declared in this file.",
            ));
        };
        if method.params.len() < 2 {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` has fewer than two parameters.",
                method.name
            )));
        }
        if self.new_order.is_empty() {
            self.new_order = (0..method.params.len()).collect();
        }
        self.target = Some(Target {
            type_name: ty.name.clone(),
            method_name: method.name.clone(),
            name_range,
            param_types: method.params.iter().map(|p| p.ty.clone()).collect(),
            param_names: method.params.iter().map(|p| p.name.clone()).collect(),
        });
        monitor.done();
        Ok(writable_status(self.model.as_ref(), &self.file))
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let target = self.target()?.clone();
        let arity = target.param_types.len();
        let mut sorted = self.new_order.clone();
        sorted.sort_unstable();
        if sorted != (0..arity).collect::<Vec<_>>() {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "The new order must be a permutation of 0..{arity}."
            )));
        }
        if target.param_types.last().is_some_and(|t| t.ends_with("...")) && self.new_order.last() != Some(&(arity - 1)) {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "A variable-arity parameter must stay last.",
            ));
        }

        let mut status = RefactoringStatus::new();
        if self.new_order.iter().enumerate().all(|(i, &old)| i == old) {
            status.add_error("The parameter order is unchanged.");
        }

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, _)) = method_by_name_range(&unit.syntax, target.name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status("The method no longer exists."));
        };
        let reordered: Vec<&str> = self.new_order.iter().map(|&i| target.param_types[i].as_str()).collect();
        for other in ty.methods_named(&target.method_name) {
            if other.name_range == target.name_range {
                continue;
            }
            if other.param_types() == reordered {
                status.add_error(format!(
                    "`{}` already has a method `{}({})`.",
                    ty.name,
                    target.method_name,
                    reordered.join(", ")
                ));
            } else if other.params.len() == arity {
                status.add_warning(format!(
                    "Calls of the overload `{}({})` with the same number of arguments are also reordered.",
                    target.method_name,
                    other.param_types().join(", ")
                ));
            }
        }

        let files = self.model.files();
        monitor.begin_task("Checking call sites", files.len() as u64);
        for file in files {
            monitor.check_cancelled()?;
            let unit = SourceUnit::load(self.model.as_ref(), &file)?;
            let tokens = unit.tokens();
            if !find_calls(&unit, &tokens, &target.method_name, arity).is_empty()
                && !self.model.exists_and_writable(&file)
            {
                status.add_error(format!("`{file}` calls `{}` but is read-only.", target.method_name));
            }
            monitor.worked(1);
        }
        monitor.done();
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let target = self.target()?.clone();
        let arity = target.param_types.len();
        let mut composite = CompositeChange::new(self.name());

        let files = self.model.files();
        monitor.begin_task("Updating call sites", files.len() as u64);
        for file in files {
            monitor.check_cancelled()?;
            let unit = SourceUnit::load(self.model.as_ref(), &file)?;
            let tokens = unit.tokens();
            let calls = find_calls(&unit, &tokens, &target.method_name, arity);
            let rewriter = CallRewriter {
                text: &unit.text,
                calls: &calls,
                order: &self.new_order,
            };

            let mut edits: Vec<TextEdit> = calls
                .iter()
                .filter(|c| !calls.iter().any(|o| o.contains(c)))
                .map(|c| TextEdit::new(TextRange::new(c.open.end(), c.close.start()), rewriter.arguments(c)))
                .collect();

            if file == self.file {
                if let Some((_, method)) = method_by_name_range(&unit.syntax, target.name_range) {
                    for (position, &old) in self.new_order.iter().enumerate() {
                        if position != old {
                            let text = unit.text[method.params[old].range].to_string();
                            edits.push(TextEdit::new(method.params[position].range, text));
                        }
                    }
                }
            }

            if !edits.is_empty() {
                tracing::debug!(target: "refract.refactor", file = %file, edits = edits.len(), "reorder parameters");
                composite.add(unit.change(format!("Reorder arguments in `{file}`"), edits));
            }
            monitor.worked(1);
        }
        monitor.done();
        Ok(Box::new(composite))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_calls_are_reordered_from_the_inside_out() {
        let unit = SourceUnit::from_text(
            FileId::new("A.java"),
            "class A { void f(int a, int b) {} void g() { f(1, f(2, 3)); } }".to_string(),
        );
        let tokens = unit.tokens();
        let calls = find_calls(&unit, &tokens, "f", 2);
        assert_eq!(calls.len(), 2);
        let rewriter = CallRewriter {
            text: &unit.text,
            calls: &calls,
            order: &[1, 0],
        };
        assert_eq!(rewriter.arguments(&calls[0]), "f(3, 2), 1");
    }

    #[test]
    fn declarations_and_other_arities_are_not_calls() {
        let unit = SourceUnit::from_text(
            FileId::new("A.java"),
            "class A { void f(int a, int b) { f(1); f(1, 2); } }".to_string(),
        );
        let tokens = unit.tokens();
        let calls = find_calls(&unit, &tokens, "f", 2);
        assert_eq!(calls.len(), 1);
        assert_eq!(&unit.text[calls[0].args[1]], "2");
    }
}
