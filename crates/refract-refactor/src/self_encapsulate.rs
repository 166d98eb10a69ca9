use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange, TextSize};
use refract_syntax::{Block, FieldDecl, SourceFile, TokenKind, TypeDecl, TypeKind};

use crate::change::{Change, CompositeChange};
use crate::element::ElementKind;
use crate::model::ElementModel;
use crate::names::{check_method_name, getter_name, setter_name};
use crate::promote_temp::Visibility;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::status::RefactoringStatus;
use crate::support::{binding_at, expression_precedence, render_range, writable_status, SourceUnit};
use crate::tokens::{binary_precedence, is_assignment_operator, CodeTokens};

#[derive(Clone, Debug)]
struct Target {
    field: String,
    name_range: TextRange,
    ty: String,
    type_name: String,
    is_static: bool,
    is_final: bool,
    was_private: bool,
}

/// Replaces direct accesses to a field with a getter and setter, and makes the field private.
pub struct SelfEncapsulateField {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    getter: String,
    setter: String,
    visibility: Visibility,
    encapsulate_declaring_class: bool,
    target: Option<Target>,
}

impl SelfEncapsulateField {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            getter: String::new(),
            setter: String::new(),
            visibility: Visibility::Public,
            encapsulate_declaring_class: true,
            target: None,
        }
    }

    pub fn set_getter_name(&mut self, name: impl Into<String>) {
        self.getter = name.into();
    }

    pub fn getter_name(&self) -> &str {
        &self.getter
    }

    pub fn set_setter_name(&mut self, name: impl Into<String>) {
        self.setter = name.into();
    }

    pub fn setter_name(&self) -> &str {
        &self.setter
    }

    pub fn set_accessor_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    /// Whether accesses inside the declaring class go through the accessors too.
    pub fn set_encapsulate_declaring_class(&mut self, on: bool) {
        self.encapsulate_declaring_class = on;
    }

    fn target(&self) -> Result<Target, RefactorError> {
        self.target
            .clone()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }

    fn setter(&self, target: &Target) -> Option<&str> {
        (!target.is_final).then_some(self.setter.as_str())
    }

    fn plan(&self, target: &Target, monitor: &ProgressMonitor) -> Result<Plan, RefactorError> {
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let (ty, field) = find_field(&unit.syntax, target.name_range)
            .ok_or_else(|| RefactorError::NotReady("the field no longer exists".into()))?;
        let rewriter = AccessRewriter {
            getter: &self.getter,
            setter: self.setter(target),
        };

        let mut plan = Plan::default();
        let mut edits = Vec::new();
        edits.extend(visibility_edit(field));
        edits.push(self.accessor_insertion(&unit, target, ty, field));
        if self.encapsulate_declaring_class {
            let tokens = unit.tokens();
            let refs = declaring_refs(&tokens, ty, &target.field);
            let rewrite = rewriter.rewrite(&tokens, &refs);
            plan.skipped += rewrite.skipped;
            edits.extend(rewrite.edits);
        }
        plan.files.push((unit, edits));

        if !target.was_private {
            let files = self.model.files();
            monitor.begin_task("Updating field accesses", files.len() as u64);
            for file in files {
                monitor.check_cancelled()?;
                if file == self.file {
                    continue;
                }
                let unit = SourceUnit::load(self.model.as_ref(), &file)?;
                let tokens = unit.tokens();
                let refs = external_refs(&tokens, &target.field, &target.type_name);
                if refs.is_empty() {
                    continue;
                }
                let rewrite = rewriter.rewrite(&tokens, &refs);
                plan.skipped += rewrite.skipped;
                if !rewrite.edits.is_empty() {
                    plan.files.push((unit, rewrite.edits));
                }
                monitor.worked(1);
            }
            monitor.done();
        }
        Ok(plan)
    }

    fn accessor_insertion(&self, unit: &SourceUnit, target: &Target, ty: &TypeDecl, field: &FieldDecl) -> TextEdit {
        let le = unit.le();
        let indent = if unit.starts_line(field.range.start()) {
            unit.indent_at(field.range.start()).to_string()
        } else {
            format!("{}{}", unit.indent_at(ty.name_range.start()), unit.indent_unit())
        };
        let body = format!("{indent}{}", unit.indent_unit());
        let mut prefix = String::new();
        if !self.visibility.keyword().is_empty() {
            prefix.push_str(self.visibility.keyword());
            prefix.push(' ');
        }
        if target.is_static {
            prefix.push_str("static ");
        }
        let (name, ty_name) = (&target.field, &target.ty);

        let mut text = format!(
            "{le}{indent}{prefix}{ty_name} {}() {{{le}{body}return {name};{le}{indent}}}{le}",
            self.getter
        );
        if let Some(setter) = self.setter(target) {
            let assignee = if target.is_static {
                format!("{}.{name}", target.type_name)
            } else {
                format!("this.{name}")
            };
            text.push_str(&format!(
                "{le}{indent}{prefix}void {setter}({ty_name} {name}) {{{le}{body}{assignee} = {name};{le}{indent}}}{le}"
            ));
        }

        let close = ty.body_end();
        if unit.starts_line(close) {
            TextEdit::insert(unit.line_start(close), text)
        } else {
            TextEdit::insert(close, text)
        }
    }
}

#[derive(Default)]
struct Plan {
    files: Vec<(SourceUnit, Vec<TextEdit>)>,
    /// Writes left unchanged because they are not standalone statements.
    skipped: usize,
}

fn find_field(syntax: &SourceFile, name_range: TextRange) -> Option<(&TypeDecl, &FieldDecl)> {
    syntax.all_types().into_iter().find_map(|ty| {
        ty.fields
            .iter()
            .find(|f| f.name_range == name_range)
            .map(|f| (ty, f))
    })
}

fn visibility_edit(field: &FieldDecl) -> Option<TextEdit> {
    let current = field
        .modifiers
        .iter()
        .find(|m| matches!(m.text.as_str(), "public" | "protected" | "private"));
    match current {
        Some(m) if m.text == "private" => None,
        Some(m) => Some(TextEdit::new(m.range, "private")),
        None => Some(TextEdit::insert(field.ty_range.start(), "private ")),
    }
}

/// Accesses to `field` in `range`: unqualified, `this.field` or `Type.field`.
fn field_refs(tokens: &CodeTokens<'_>, range: TextRange, field: &str, type_name: &str) -> Vec<usize> {
    tokens
        .indices_in(range)
        .filter(|&idx| tokens.is_ident(idx, field) && !tokens.is_call(idx))
        .filter(|&idx| {
            !tokens.is_qualified(idx)
                || tokens.is_this_qualified(idx)
                || (idx >= 2 && tokens.is_ident(idx - 2, type_name) && tokens.prev_text(idx - 2) != Some("."))
        })
        .collect()
}

fn block_shadows(block: &Block, name: &str, offset: TextSize) -> bool {
    block
        .all_locals()
        .iter()
        .any(|l| l.name == name && l.scope.contains_inclusive(offset))
}

/// Accesses to `field` in the methods and initializers of its declaring type.
fn declaring_refs(tokens: &CodeTokens<'_>, ty: &TypeDecl, field: &str) -> Vec<usize> {
    let mut refs = Vec::new();
    for method in &ty.methods {
        let Some(body) = &method.body else {
            continue;
        };
        refs.extend(
            field_refs(tokens, body.range, field, &ty.name)
                .into_iter()
                .filter(|&idx| {
                    tokens.is_qualified(idx)
                        || binding_at(method, field, tokens.tokens[idx].range.start()).is_none()
                }),
        );
    }
    for block in &ty.initializers {
        refs.extend(
            field_refs(tokens, block.range, field, &ty.name)
                .into_iter()
                .filter(|&idx| {
                    tokens.is_qualified(idx) || !block_shadows(block, field, tokens.tokens[idx].range.start())
                }),
        );
    }
    refs.sort_unstable();
    refs
}

/// Qualified accesses `x.field` in a compilation unit that mentions `type_name`.
fn external_refs(tokens: &CodeTokens<'_>, field: &str, type_name: &str) -> Vec<usize> {
    let mentions_type = (0..tokens.tokens.len()).any(|idx| tokens.is_ident(idx, type_name));
    if !mentions_type {
        return Vec::new();
    }
    (0..tokens.tokens.len())
        .filter(|&idx| {
            tokens.is_ident(idx, field)
                && tokens.is_qualified(idx)
                && !tokens.is_this_qualified(idx)
                && !tokens.is_call(idx)
        })
        .collect()
}

/// First token of the qualifier chain ending at `idx` (`a.b.idx` yields the index of `a`).
fn chain_start(tokens: &CodeTokens<'_>, idx: usize) -> usize {
    let mut start = idx;
    while start >= 2
        && tokens.text_at(start - 1) == Some(".")
        && tokens
            .get(start - 2)
            .is_some_and(|t| t.kind == TokenKind::Identifier || t.text(tokens.text) == "this")
    {
        start -= 2;
    }
    start
}

fn starts_statement(prev: Option<&str>) -> bool {
    matches!(prev, None | Some(";" | "{" | "}" | ")" | "else" | "->" | ":" | "do"))
}

fn ends_statement(next: Option<&str>) -> bool {
    matches!(next, Some(";" | ")"))
}

#[derive(Default)]
struct Rewrite {
    edits: Vec<TextEdit>,
    skipped: usize,
}

/// Turns field reads into getter calls and statement-level writes into setter calls.
struct AccessRewriter<'a> {
    getter: &'a str,
    /// `None` for final fields, whose writes stay untouched.
    setter: Option<&'a str>,
}

impl AccessRewriter<'_> {
    fn rewrite(&self, tokens: &CodeTokens<'_>, refs: &[usize]) -> Rewrite {
        let mut out = Rewrite::default();
        let mut consumed: HashSet<usize> = HashSet::new();
        for &idx in refs {
            if consumed.contains(&idx) || !is_field_write(tokens, idx) {
                continue;
            }
            consumed.insert(idx);
            let Some(setter) = self.setter else {
                continue;
            };
            match self.write_edits(tokens, idx, refs, setter) {
                Some((edits, inner)) => {
                    out.edits.extend(edits);
                    consumed.extend(inner);
                }
                None => out.skipped += 1,
            }
        }
        for &idx in refs {
            if !consumed.contains(&idx) {
                out.edits
                    .push(TextEdit::new(tokens.tokens[idx].range, format!("{}()", self.getter)));
            }
        }
        out
    }

    /// Getter call with the same qualifier as the access at `idx`.
    fn getter_call(&self, tokens: &CodeTokens<'_>, idx: usize) -> String {
        let start = chain_start(tokens, idx);
        if start == idx {
            format!("{}()", self.getter)
        } else {
            let qualifier = &tokens.text[tokens.span(start, idx - 2)];
            format!("{qualifier}.{}()", self.getter)
        }
    }

    /// Edits for the write at `idx`, plus the reads they absorb; `None` when the write is part
    /// of a larger expression.
    fn write_edits(
        &self,
        tokens: &CodeTokens<'_>,
        idx: usize,
        refs: &[usize],
        setter: &str,
    ) -> Option<(Vec<TextEdit>, Vec<usize>)> {
        let start = chain_start(tokens, idx);
        let get = self.getter_call(tokens, idx);
        match tokens.next_text(idx) {
            Some(op @ ("++" | "--")) => {
                if !starts_statement(tokens.prev_text(start)) || !ends_statement(tokens.text_at(idx + 2)) {
                    return None;
                }
                let edit = TextEdit::new(tokens.span(idx, idx + 1), format!("{setter}({get} {} 1)", &op[..1]));
                Some((vec![edit], Vec::new()))
            }
            Some(op) if is_assignment_operator(op) => {
                let end = tokens.expression_end(idx + 2);
                if end <= idx + 2 || !starts_statement(tokens.prev_text(start)) || !ends_statement(tokens.text_at(end)) {
                    return None;
                }
                let inner: Vec<usize> = refs.iter().copied().filter(|&j| j > idx + 1 && j < end).collect();
                if inner.iter().any(|&j| is_field_write(tokens, j)) {
                    return None;
                }
                let rhs = tokens.span(idx + 2, end - 1);
                let reads: Vec<(TextRange, String)> = inner
                    .iter()
                    .map(|&j| (tokens.tokens[j].range, format!("{}()", self.getter)))
                    .collect();
                let value = render_range(tokens.text, rhs, &reads);
                let value = match op.strip_suffix('=').filter(|binary| !binary.is_empty()) {
                    None => value,
                    Some(binary) => {
                        let rhs_prec = expression_precedence(tokens, rhs);
                        if binary_precedence(binary).map_or(true, |prec| rhs_prec <= prec) {
                            format!("{get} {binary} ({value})")
                        } else {
                            format!("{get} {binary} {value}")
                        }
                    }
                };
                let edit = TextEdit::new(tokens.span(idx, end - 1), format!("{setter}({value})"));
                Some((vec![edit], inner))
            }
            _ => {
                let op_idx = start.checked_sub(1)?;
                let op = tokens.text_at(op_idx).filter(|op| matches!(*op, "++" | "--"))?;
                if !starts_statement(tokens.prev_text(op_idx)) || !ends_statement(tokens.next_text(idx)) {
                    return None;
                }
                let delete = TextRange::new(tokens.tokens[op_idx].range.start(), tokens.tokens[start].range.start());
                let call = format!("{setter}({get} {} 1)", &op[..1]);
                Some((
                    vec![TextEdit::delete(delete), TextEdit::new(tokens.tokens[idx].range, call)],
                    Vec::new(),
                ))
            }
        }
    }
}

/// Whether the access at `idx` assigns, increments or decrements the field.
fn is_field_write(tokens: &CodeTokens<'_>, idx: usize) -> bool {
    let start = chain_start(tokens, idx);
    tokens
        .next_text(idx)
        .is_some_and(|t| is_assignment_operator(t) || t == "++" || t == "--")
        || matches!(tokens.prev_text(start), Some("++" | "--"))
}

impl Refactoring for SelfEncapsulateField {
    fn name(&self) -> String {
        match &self.target {
            Some(target) => format!("Encapsulate field `{}`", target.field),
            None => "Encapsulate field".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::SelfEncapsulateField
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let element = match self.model.resolve_element_at(&self.file, self.selection) {
            Ok(element) if element.kind == ElementKind::Field => element,
            _ => return Ok(RefactoringStatus::create_fatal_error_status("Select a field.")),
        };
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, field)) = find_field(&unit.syntax, element.range) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The field is not declared in this file.",
            ));
        };
        if matches!(ty.kind, TypeKind::Interface | TypeKind::Annotation) {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is an interface constant and cannot be encapsulated.",
                field.name
            )));
        }
        if field.multi {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is declared together with other fields; split the declaration first.",
                field.name
            )));
        }

        if self.getter.is_empty() {
            self.getter = getter_name(&field.name, &field.ty);
        }
        if self.setter.is_empty() {
            self.setter = setter_name(&field.name);
        }
        self.target = Some(Target {
            field: field.name.clone(),
            name_range: field.name_range,
            ty: field.ty.clone(),
            type_name: ty.name.clone(),
            is_static: field.modifiers.iter().any(|m| m.text == "static"),
            is_final: field.modifiers.iter().any(|m| m.text == "final"),
            was_private: field.modifiers.iter().any(|m| m.text == "private"),
        });
        monitor.done();
        Ok(writable_status(self.model.as_ref(), &self.file))
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let target = self.target()?;
        let mut status = check_method_name(&self.getter);
        if let Some(setter) = self.setter(&target) {
            status.merge(check_method_name(setter));
        }
        if status.has_fatal_error() {
            return Ok(status);
        }

        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, _)) = find_field(&unit.syntax, target.name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status("The field no longer exists."));
        };
        if ty.methods_named(&self.getter).any(|m| m.params.is_empty()) {
            status.add_error(format!("`{}` already declares a method `{}()`.", ty.name, self.getter));
        }
        match self.setter(&target) {
            Some(setter) => {
                if ty.methods_named(setter).any(|m| m.params.len() == 1) {
                    status.add_error(format!(
                        "`{}` already declares a method `{setter}({})`.",
                        ty.name, target.ty
                    ));
                }
            }
            None => status.add_info(format!(
                "`{}` is final; only a getter is created.",
                target.field
            )),
        }

        let plan = self.plan(&target, monitor)?;
        for (unit, _) in plan.files.iter().skip(1) {
            if !self.model.exists_and_writable(&unit.file) {
                status.add_error(format!("`{}` is read-only.", unit.file));
            }
        }
        if plan.skipped > 0 {
            status.add_warning(format!(
                "{} assignment(s) to `{}` inside larger expressions are left unchanged.",
                plan.skipped, target.field
            ));
        }
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let target = self.target()?;
        let plan = self.plan(&target, monitor)?;
        if plan.files.len() == 1 {
            if let Some((unit, edits)) = plan.files.into_iter().next() {
                return Ok(Box::new(unit.change(self.name(), edits)));
            }
            return Err(RefactorError::NotReady("nothing to change".into()));
        }
        let mut composite = CompositeChange::new(self.name());
        for (unit, edits) in plan.files {
            composite.add(unit.change(format!("Update `{}`", unit.file), edits));
        }
        tracing::debug!(target: "refract.refactor", field = %target.field, "self encapsulate field");
        Ok(Box::new(composite))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
