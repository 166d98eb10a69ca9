use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange, TextSize};
use refract_syntax::{Block, MethodDecl, TokenKind, TypeDecl};

use crate::change::Change;
use crate::model::ElementModel;
use crate::names::{check_variable_name, guess_temp_name, make_unique};
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::status::RefactoringStatus;
use crate::support::{
    binding_at, expression_precedence, needs_parentheses, variable_names, writable_status, SourceUnit,
    Variable, PRIMARY,
};
use crate::tokens::{is_assignment_operator, CodeTokens};

#[derive(Clone, Debug)]
struct Analysis {
    /// The selected expression, trimmed to whole tokens.
    expression: TextRange,
    method_range: TextRange,
    ty: Option<String>,
}

/// Where the declaration goes and which ranges it replaces.
#[derive(Debug)]
struct Plan {
    occurrences: Vec<TextRange>,
    insert_at: TextSize,
    indent: String,
    /// Set when the first occurrence is a whole expression statement, which the declaration
    /// replaces.
    replace_statement: Option<TextRange>,
    /// The block the new local is visible in.
    scope: TextRange,
}

/// Introduces a local variable initialized with the selected expression.
pub struct ExtractTemp {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    temp_name: String,
    replace_all: bool,
    declare_final: bool,
    analysis: Option<Analysis>,
}

impl ExtractTemp {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            temp_name: String::new(),
            replace_all: true,
            declare_final: false,
            analysis: None,
        }
    }

    pub fn set_temp_name(&mut self, name: impl Into<String>) {
        self.temp_name = name.into();
    }

    /// The configured name, or the guessed one after `check_activation`.
    pub fn temp_name(&self) -> &str {
        &self.temp_name
    }

    pub fn set_replace_all_occurrences(&mut self, on: bool) {
        self.replace_all = on;
    }

    pub fn set_declare_final(&mut self, on: bool) {
        self.declare_final = on;
    }

    /// The declared type of the new local; `None` until activation or when it is `var`.
    pub fn inferred_type(&self) -> Option<&str> {
        self.analysis.as_ref().and_then(|a| a.ty.as_deref())
    }

    fn analysis(&self) -> Result<&Analysis, RefactorError> {
        self.analysis
            .as_ref()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }

    fn plan(&self, unit: &SourceUnit, analysis: &Analysis) -> Option<Plan> {
        let (_, method) = unit.syntax.method_at(analysis.method_range.start())?;
        let body = method.body.as_ref()?;
        let tokens = unit.tokens();
        let selected = tokens.indices_in(analysis.expression);

        let mut occurrences = vec![analysis.expression];
        if self.replace_all {
            occurrences = find_occurrences(&tokens, body.range, selected.len(), |idx| {
                (0..selected.len()).all(|k| tokens.text_at(idx + k) == tokens.text_at(selected.start + k))
            });
            if !occurrences.contains(&analysis.expression) {
                occurrences.push(analysis.expression);
                occurrences.sort_by_key(|r| r.start());
            }
        }

        let first = *occurrences.first()?;
        let block = common_block(body, &occurrences);
        let statement = block
            .statements
            .iter()
            .copied()
            .find(|s| s.contains_range(first))
            .unwrap_or(first);

        let after = tokens.indices_in(TextRange::new(first.end(), statement.end()));
        let is_expression_statement = statement.start() == first.start()
            && after.len() == 1
            && tokens.text_at(after.start) == Some(";");

        Some(Plan {
            insert_at: statement.start(),
            indent: unit.indent_at(statement.start()).to_string(),
            replace_statement: is_expression_statement.then_some(statement),
            scope: TextRange::new(statement.start(), block.range.end()),
            occurrences,
        })
    }

    fn declaration(&self, unit: &SourceUnit, analysis: &Analysis) -> String {
        let ty = analysis.ty.as_deref().unwrap_or("var");
        let modifier = if self.declare_final { "final " } else { "" };
        format!(
            "{modifier}{ty} {} = {};",
            self.temp_name, &unit.text[analysis.expression]
        )
    }
}

/// Non-overlapping token runs of length `len` inside `range` accepted by `matches` that are
/// complete expressions in their context.
fn find_occurrences(
    tokens: &CodeTokens<'_>,
    range: TextRange,
    len: usize,
    matches: impl Fn(usize) -> bool,
) -> Vec<TextRange> {
    let mut out = Vec::new();
    if len == 0 {
        return out;
    }
    let indices = tokens.indices_in(range);
    let mut idx = indices.start;
    while idx + len <= indices.end {
        if matches(idx) && expression_problem(tokens, idx, idx + len - 1).is_none() {
            out.push(tokens.span(idx, idx + len - 1));
            idx += len;
        } else {
            idx += 1;
        }
    }
    out
}

/// Why tokens `first..=last` cannot be extracted, if they cannot.
fn expression_problem(tokens: &CodeTokens<'_>, first: usize, last: usize) -> Option<&'static str> {
    let mut depth = 0i32;
    for idx in first..=last {
        let Some(token) = tokens.get(idx) else {
            return Some("The selection does not cover a complete expression.");
        };
        match token.text(tokens.text) {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth -= 1;
                if depth < 0 {
                    return Some("The selection does not cover a complete expression.");
                }
            }
            ";" if depth == 0 => return Some("The selection contains a statement terminator."),
            _ => {}
        }
        if idx > first && token.kind == TokenKind::Identifier {
            let declares = tokens.get(idx - 1).is_some_and(|prev| {
                matches!(prev.kind, TokenKind::Identifier | TokenKind::Keyword)
                    && !matches!(prev.text(tokens.text), "new" | "instanceof" | "return" | "this" | "super")
            });
            if declares {
                return Some("The selection contains a declaration.");
            }
        }
    }
    if depth != 0 {
        return Some("The selection does not cover a complete expression.");
    }

    let Some(first_token) = tokens.get(first) else {
        return Some("Select an expression to extract.");
    };
    if first_token.kind == TokenKind::Keyword
        && !matches!(
            first_token.text(tokens.text),
            "new" | "this" | "super" | "true" | "false" | "null" | "switch"
        )
    {
        return Some("The selection is not an expression.");
    }

    if tokens.next_text(last).is_some_and(|t| is_assignment_operator(t) || t == "++" || t == "--")
        || matches!(tokens.prev_text(first), Some("++" | "--"))
    {
        return Some("Cannot extract the target of an assignment.");
    }
    if matches!(tokens.prev_text(first), Some("new")) || tokens.next_text(last) == Some("(") {
        return Some("The selection is a name, not an expression.");
    }
    if tokens
        .get(last + 1)
        .is_some_and(|t| t.kind == TokenKind::Identifier)
    {
        return Some("The selection is a type reference.");
    }
    let range = tokens.span(first, last);
    if needs_parentheses(tokens, first, last, expression_precedence(tokens, range))
        || (tokens.prev_text(first) == Some(".") && expression_precedence(tokens, range) == PRIMARY)
    {
        return Some("The selection is not a complete expression.");
    }
    None
}

/// The innermost block containing all `ranges`.
fn common_block<'b>(block: &'b Block, ranges: &[TextRange]) -> &'b Block {
    block
        .blocks
        .iter()
        .find(|child| ranges.iter().all(|r| child.range.contains_range(*r)))
        .map_or(block, |child| common_block(child, ranges))
}

fn number_type(literal: &str) -> &'static str {
    let lower = literal.to_ascii_lowercase();
    if lower.ends_with('l') {
        "long"
    } else if lower.starts_with("0x") || lower.starts_with("0b") {
        "int"
    } else if lower.ends_with('f') {
        "float"
    } else if lower.ends_with('d') || lower.contains('.') || lower.contains('e') {
        "double"
    } else {
        "int"
    }
}

fn variable_type(method: &MethodDecl, ty: &TypeDecl, name: &str, offset: TextSize) -> Option<String> {
    let declared = match binding_at(method, name, offset) {
        Some(Variable::Local(range)) => method
            .locals()
            .into_iter()
            .find(|l| l.name_range == range)
            .map(|l| l.ty.clone()),
        Some(Variable::Param(range)) => method
            .params
            .iter()
            .find(|p| p.name_range == range)
            .map(|p| match p.ty.strip_suffix("...") {
                Some(element) => format!("{element}[]"),
                None => p.ty.clone(),
            }),
        None => ty.field(name).map(|f| f.ty.clone()),
    };
    declared.filter(|t| t != "var")
}

/// A shift has the promoted type of its left operand: `long` or `int`.
fn shift_type(tokens: &CodeTokens<'_>, ty: &TypeDecl, method: &MethodDecl, first: usize) -> &'static str {
    let left = match tokens.get(first) {
        Some(token) if token.kind == TokenKind::Number => Some(number_type(token.text(tokens.text)).to_string()),
        Some(token) if token.kind == TokenKind::Identifier => {
            variable_type(method, ty, token.text(tokens.text), token.range.start())
        }
        _ => None,
    };
    match left.as_deref() {
        Some("long" | "Long") => "long",
        _ => "int",
    }
}

/// Best-effort static type of the expression `range`.
fn infer_type(
    tokens: &CodeTokens<'_>,
    ty: &TypeDecl,
    method: &MethodDecl,
    range: TextRange,
) -> Option<String> {
    let indices = tokens.indices_in(range);
    let (first, end) = (indices.start, indices.end);
    let texts: Vec<&str> = indices.clone().filter_map(|i| tokens.text_at(i)).collect();
    let first_token = tokens.get(first)?;

    if texts.len() == 1 {
        return match first_token.kind {
            TokenKind::StringLiteral | TokenKind::TextBlock => Some("String".into()),
            TokenKind::CharLiteral => Some("char".into()),
            TokenKind::Number => Some(number_type(texts[0]).into()),
            TokenKind::Keyword if matches!(texts[0], "true" | "false") => Some("boolean".into()),
            TokenKind::Identifier => variable_type(method, ty, texts[0], first_token.range.start()),
            _ => None,
        };
    }
    if texts.len() == 3 && texts[0] == "this" && texts[1] == "." {
        return ty.field(texts[2]).map(|f| f.ty.clone()).filter(|t| t != "var");
    }

    let prec = expression_precedence(tokens, range);
    if matches!(prec, 2 | 3 | 7 | 8) || (prec == 12 && texts[0] == "!") {
        return Some("boolean".into());
    }
    if prec == 9 {
        return Some(shift_type(tokens, ty, method, first).into());
    }
    if prec == 10
        && indices
            .clone()
            .any(|i| tokens.get(i).is_some_and(|t| t.kind == TokenKind::StringLiteral))
    {
        return Some("String".into());
    }
    if prec != PRIMARY {
        // A cast `(T) x` has the cast type.
        if prec == 12 && texts[0] == "(" {
            let close = tokens.matching_close(first)?;
            if close <= first + 1 {
                return None;
            }
            return Some(tokens.text[tokens.span(first + 1, close - 1)].to_string());
        }
        return None;
    }

    if texts[0] == "new" {
        let type_end = (first + 1..end).find(|&i| matches!(tokens.text_at(i), Some("(" | "[" | "{")))?;
        if type_end == first + 1 {
            return None;
        }
        let base = &tokens.text[tokens.span(first + 1, type_end - 1)];
        if base.contains("<>") {
            return None;
        }
        return match tokens.text_at(type_end) {
            Some("(") => Some(base.to_string()),
            Some("[") => {
                let mut dims = 0;
                let mut idx = type_end;
                while tokens.text_at(idx) == Some("[") {
                    dims += 1;
                    idx = tokens.matching_close(idx)? + 1;
                }
                Some(format!("{base}{}", "[]".repeat(dims)))
            }
            _ => None,
        };
    }

    // `name(...)` or `this.name(...)` calling a method of the enclosing type.
    let name_idx = match texts.as_slice() {
        [_, "(", .., ")"] => first,
        ["this", ".", _, "(", .., ")"] => first + 2,
        _ => return None,
    };
    let open = name_idx + 1;
    if tokens.matching_close(open) != Some(end - 1) {
        return None;
    }
    let arity = tokens.split_args(open, end - 1).len();
    let name = tokens.text_at(name_idx)?;
    ty.methods_named(name)
        .find(|m| m.params.len() == arity)
        .and_then(|m| m.return_type.clone())
        .filter(|t| t != "void")
}

impl Refactoring for ExtractTemp {
    fn name(&self) -> String {
        if self.temp_name.is_empty() {
            "Extract local variable".to_string()
        } else {
            format!("Extract local variable `{}`", self.temp_name)
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ExtractTemp
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Analyzing selection", 1);
        if self.selection.is_empty() {
            return Ok(RefactoringStatus::create_fatal_error_status("Select an expression to extract."));
        }
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let tokens = unit.tokens();

        let partial = tokens.tokens.iter().any(|t| {
            t.range.start() < self.selection.end()
                && self.selection.start() < t.range.end()
                && !self.selection.contains_range(t.range)
        });
        let covered = tokens.indices_in(self.selection);
        if partial || covered.is_empty() {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selection does not cover a complete expression.",
            ));
        }
        let (first, last) = (covered.start, covered.end - 1);
        let expression = tokens.span(first, last);

        let in_body = unit
            .syntax
            .method_at(expression.start())
            .filter(|(_, m)| m.body.as_ref().is_some_and(|b| b.range.contains_range(expression)));
        let Some((ty, method)) = in_body else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "Only expressions inside method bodies can be extracted.",
            ));
        };
        if let Some(problem) = expression_problem(&tokens, first, last) {
            return Ok(RefactoringStatus::create_fatal_error_status(problem));
        }

        let mut status = writable_status(self.model.as_ref(), &self.file);
        let inferred = infer_type(&tokens, ty, method, expression);
        if inferred.is_none() {
            status.add_info("The type of the expression could not be determined; `var` is used.");
        }
        if self.temp_name.is_empty() {
            let mut taken: HashSet<String> = variable_names(method);
            taken.extend(ty.fields.iter().map(|f| f.name.clone()));
            self.temp_name = make_unique(&guess_temp_name(&unit.text[expression]), &taken);
        }
        self.analysis = Some(Analysis {
            expression,
            method_range: method.range,
            ty: inferred,
        });
        monitor.done();
        Ok(status)
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let analysis = self.analysis()?.clone();
        let mut status = check_variable_name(&self.temp_name);
        if status.has_fatal_error() {
            return Ok(status);
        }
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let (Some((ty, method)), Some(plan)) = (
            unit.syntax.method_at(analysis.method_range.start()),
            self.plan(&unit, &analysis),
        ) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected expression no longer exists.",
            ));
        };

        let collides = method.params.iter().any(|p| p.name == self.temp_name)
            || method.locals().into_iter().any(|l| {
                l.name == self.temp_name
                    && (l.scope.contains_inclusive(plan.insert_at) || plan.scope.contains(l.name_range.start()))
            });
        if collides {
            status.add_error(format!("A variable named `{}` already exists in this scope.", self.temp_name));
        }
        if ty.field(&self.temp_name).is_some() {
            status.add_warning(format!("The new local shadows field `{}`.", self.temp_name));
        }
        if plan.occurrences.len() > 1 {
            status.add_info(format!("{} occurrences will be replaced.", plan.occurrences.len()));
        }
        monitor.done();
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let analysis = self.analysis()?.clone();
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let plan = self
            .plan(&unit, &analysis)
            .ok_or_else(|| RefactorError::NotReady("the selected expression no longer exists".into()))?;
        let declaration = self.declaration(&unit, &analysis);

        let mut edits = Vec::new();
        match plan.replace_statement {
            Some(statement) => edits.push(TextEdit::new(statement, declaration)),
            None => edits.push(TextEdit::insert(
                plan.insert_at,
                format!("{declaration}{}{}", unit.le(), plan.indent),
            )),
        }
        for occurrence in &plan.occurrences {
            if plan.replace_statement.is_some_and(|s| s.contains_range(*occurrence)) {
                continue;
            }
            edits.push(TextEdit::new(*occurrence, self.temp_name.clone()));
        }
        monitor.worked(1);
        tracing::debug!(target: "refract.refactor", name = %self.temp_name, occurrences = plan.occurrences.len(), "extract temp");
        Ok(Box::new(unit.change(self.name(), edits)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
