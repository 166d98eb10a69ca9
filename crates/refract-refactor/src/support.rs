//! Shared plumbing for the concrete refactorings.

use std::collections::HashSet;

use refract_core::{FileId, LineEnding, LineIndex, TextEdit, TextRange, TextSize};
use refract_syntax::{parse, LocalDecl, MethodDecl, SourceFile, TokenKind};

use crate::change::TextFileChange;
use crate::model::{ElementModel, ModelError};
use crate::scanner::{RefactoringScanner, ScanFlags};
use crate::status::RefactoringStatus;
use crate::tokens::{binary_precedence, is_assignment_operator, CodeTokens};

/// Precedence of an expression with no top-level operator.
pub(crate) const PRIMARY: u8 = u8::MAX;
const UNARY: u8 = 12;
const POSTFIX: u8 = 13;

/// One compilation unit loaded from the model.
pub(crate) struct SourceUnit {
    pub(crate) file: FileId,
    pub(crate) text: String,
    pub(crate) syntax: SourceFile,
    pub(crate) line_ending: LineEnding,
    pub(crate) lines: LineIndex,
}

impl SourceUnit {
    pub(crate) fn load(model: &dyn ElementModel, file: &FileId) -> Result<Self, ModelError> {
        let text = model.read_source(file)?;
        Ok(Self::from_text(file.clone(), text))
    }

    pub(crate) fn from_text(file: FileId, text: String) -> Self {
        Self {
            syntax: parse(&text),
            line_ending: LineEnding::detect(&text),
            lines: LineIndex::new(&text),
            file,
            text,
        }
    }

    pub(crate) fn tokens(&self) -> CodeTokens<'_> {
        CodeTokens::new(&self.text)
    }

    pub(crate) fn le(&self) -> &'static str {
        self.line_ending.as_str()
    }

    pub(crate) fn line_start(&self, offset: TextSize) -> TextSize {
        self.lines
            .line_start(self.lines.line_of(offset))
            .unwrap_or(offset)
    }

    /// Leading whitespace of the line containing `offset`.
    pub(crate) fn indent_at(&self, offset: TextSize) -> &str {
        let start = usize::from(self.line_start(offset));
        let line = &self.text[start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    /// Whether only whitespace precedes `offset` on its line.
    pub(crate) fn starts_line(&self, offset: TextSize) -> bool {
        let start = usize::from(self.line_start(offset));
        self.text[start..usize::from(offset)]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }

    /// Range deleting `range` together with its line when nothing else is on that line,
    /// otherwise `range` plus trailing spaces.
    pub(crate) fn deletion_range(&self, range: TextRange) -> TextRange {
        let line = self.lines.line_of(range.end());
        let line_end = self.lines.line_end(line).unwrap_or(range.end());
        let rest = &self.text[usize::from(range.end())..usize::from(line_end)];
        if self.starts_line(range.start()) && rest.trim().is_empty() {
            let next_line = self.lines.line_start(line + 1).unwrap_or(line_end);
            return TextRange::new(self.line_start(range.start()), next_line);
        }
        let trailing = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        TextRange::new(range.start(), range.end() + TextSize::from(trailing as u32))
    }

    /// One indentation step, guessed from the file.
    pub(crate) fn indent_unit(&self) -> &'static str {
        if self.text.lines().any(|line| line.starts_with('\t')) {
            "\t"
        } else {
            "    "
        }
    }

    pub(crate) fn change(&self, name: impl Into<String>, edits: Vec<TextEdit>) -> TextFileChange {
        TextFileChange::new(name, self.file.clone(), edits).with_fingerprint(&self.text)
    }
}

/// ERROR when `file` cannot be written.
pub(crate) fn writable_status(model: &dyn ElementModel, file: &FileId) -> RefactoringStatus {
    let mut status = RefactoringStatus::new();
    if !model.exists_and_writable(file) {
        status.add_error(format!("`{file}` is read-only."));
    }
    status
}

/// The variable a reference can bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Variable {
    Local(TextRange),
    Param(TextRange),
}

/// The local or parameter `name` binds to at `offset` inside `method`.
pub(crate) fn binding_at(method: &MethodDecl, name: &str, offset: TextSize) -> Option<Variable> {
    if let Some(local) = method.local_in_scope(name, offset) {
        return Some(Variable::Local(local.name_range));
    }
    method.param(name).map(|(_, p)| Variable::Param(p.name_range))
}

/// Token indices of every occurrence of `variable`, declaration included.
pub(crate) fn variable_references(
    tokens: &CodeTokens<'_>,
    method: &MethodDecl,
    name: &str,
    variable: Variable,
) -> Vec<usize> {
    tokens
        .simple_name_refs(name, method.range, false)
        .into_iter()
        .filter(|&idx| {
            let offset = tokens.tokens[idx].range.start();
            binding_at(method, name, offset) == Some(variable)
        })
        .collect()
}

/// Whether `local` is declared by a statement of its own block, as opposed to a `for` header,
/// a resource specification or a catch clause.
pub(crate) fn is_statement_local(method: &MethodDecl, local: &LocalDecl) -> bool {
    method.statement_at(local.statement_range.start()) == Some(local.statement_range)
}

/// Whether the reference at `idx` is written: an assignment target, or an operand of `++`/`--`.
pub(crate) fn is_write(tokens: &CodeTokens<'_>, idx: usize) -> bool {
    let next = tokens.next_text(idx);
    let mut first = idx;
    if tokens.is_this_qualified(idx) {
        first = idx - 2;
    }
    next.is_some_and(|t| is_assignment_operator(t) || t == "++" || t == "--")
        || matches!(tokens.prev_text(first), Some("++" | "--"))
}

/// Lowest binding strength among the top-level operators of `range`.
pub(crate) fn expression_precedence(tokens: &CodeTokens<'_>, range: TextRange) -> u8 {
    let indices = tokens.indices_in(range);
    if indices.is_empty() {
        return PRIMARY;
    }
    let (first, end) = (indices.start, indices.end);
    let mut lowest = PRIMARY;

    match tokens.text_at(first) {
        Some("-" | "+" | "!" | "~" | "++" | "--") => lowest = UNARY,
        Some("(") => {
            if let Some(close) = tokens.matching_close(first) {
                let follower = tokens.get(close + 1).filter(|_| close + 1 < end);
                let is_cast = follower.is_some_and(|t| {
                    matches!(
                        t.kind,
                        TokenKind::Identifier | TokenKind::Number | TokenKind::StringLiteral | TokenKind::CharLiteral
                    ) || matches!(t.text(tokens.text), "(" | "!" | "~" | "new" | "this" | "super")
                });
                if is_cast {
                    lowest = UNARY;
                }
            }
        }
        _ => {}
    }

    let mut depth = 0usize;
    let mut idx = first;
    while idx < end {
        let Some(text) = tokens.text_at(idx) else {
            break;
        };
        match text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            "new" if depth == 0 => {
                // Skip the instantiated type so its type arguments are not read as operators.
                while idx + 1 < end && !matches!(tokens.text_at(idx + 1), Some("(" | "[" | "{")) {
                    idx += 1;
                }
            }
            "<" if depth == 0 && tokens.prev_text(idx) == Some(".") => {
                while idx + 1 < end && tokens.text_at(idx) != Some(">") {
                    idx += 1;
                }
            }
            "->" if depth == 0 => lowest = 0,
            op if depth == 0 && is_assignment_operator(op) => lowest = 0,
            ">" if depth == 0 && idx > first && tokens.gt_run(idx) > 1 => {
                let run = tokens.gt_run(idx).min(3);
                if let Some(prec) = tokens.operator_at(idx).and_then(binary_precedence) {
                    lowest = lowest.min(prec);
                }
                idx += run - 1;
            }
            op if depth == 0 && idx > first => {
                if let Some(prec) = binary_precedence(op) {
                    lowest = lowest.min(prec);
                }
            }
            _ => {}
        }
        idx += 1;
    }
    lowest
}

/// Whether an expression of precedence `prec` placed at token span `first..=last` needs
/// parentheses to keep its meaning.
pub(crate) fn needs_parentheses(tokens: &CodeTokens<'_>, first: usize, last: usize, prec: u8) -> bool {
    if prec == PRIMARY {
        return false;
    }
    let needs_for_prev = match tokens.prev_text(first) {
        Some(".") => true,
        Some("!" | "~") => prec < UNARY,
        Some("++" | "--") => prec < POSTFIX,
        Some(")") => prec < UNARY,
        // Right operand of a split `>>` or `>>>`.
        Some(">") if first >= 2 && tokens.gt_run(first - 2) == 2 => prec <= 9,
        Some(op) => binary_precedence(op).is_some_and(|q| prec <= q),
        None => false,
    };
    let needs_for_next = match tokens.next_text(last) {
        Some("." | "[" | "++" | "--") => prec < POSTFIX,
        Some("instanceof") => prec <= 8,
        Some(_) => tokens.operator_at(last + 1).and_then(binary_precedence).is_some_and(|q| prec < q),
        None => false,
    };
    needs_for_prev || needs_for_next
}

/// Edits replacing whole-word occurrences of `old` by `new` in the comments and strings of
/// `range`, skipping matches that overlap `taken`.
pub(crate) fn textual_match_edits(
    text: &str,
    range: TextRange,
    old: &str,
    new: &str,
    flags: ScanFlags,
    taken: &[TextEdit],
) -> Vec<TextEdit> {
    RefactoringScanner::new(old)
        .with_flags(flags)
        .scan(text)
        .all()
        .into_iter()
        .map(|m| m.range())
        .filter(|r| range.contains_range(*r))
        .filter(|r| {
            !taken
                .iter()
                .any(|e| e.range.start() < r.end() && r.start() < e.range.end())
        })
        .map(|r| TextEdit::new(r, new))
        .collect()
}

/// Names of all locals and parameters of `method`.
pub(crate) fn variable_names(method: &MethodDecl) -> HashSet<String> {
    method
        .locals()
        .into_iter()
        .map(|l| l.name.clone())
        .chain(method.params.iter().map(|p| p.name.clone()))
        .collect()
}

/// Replace the token ranges `replacements` inside `range` of `text`, returning the new text of
/// `range`. Replacements must be sorted and disjoint.
pub(crate) fn render_range(text: &str, range: TextRange, replacements: &[(TextRange, String)]) -> String {
    let mut out = String::new();
    let mut cursor = range.start();
    for (r, replacement) in replacements {
        if r.start() < cursor || !range.contains_range(*r) {
            continue;
        }
        out.push_str(&text[TextRange::new(cursor, r.start())]);
        out.push_str(replacement);
        cursor = r.end();
    }
    out.push_str(&text[TextRange::new(cursor, range.end())]);
    out
}
