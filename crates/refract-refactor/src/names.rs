//! Identifier validation and name suggestions.

use std::collections::HashSet;

use refract_syntax::{is_java_identifier_part, is_java_identifier_start, is_reserved_word, TokenKind};

use crate::status::RefactoringStatus;
use crate::tokens::CodeTokens;

const FALLBACK_TEMP_NAME: &str = "temp";

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_java_identifier_start(first) => {}
        _ => return false,
    }
    chars.all(is_java_identifier_part) && !is_reserved_word(name)
}

fn check_identifier(name: &str, what: &str) -> RefactoringStatus {
    let mut status = RefactoringStatus::new();
    if name.is_empty() {
        status.add_fatal_error(format!("Choose a {what} name."));
        return status;
    }
    if is_reserved_word(name) {
        status.add_fatal_error(format!("`{name}` is a reserved word and cannot be used as a {what} name."));
        return status;
    }
    if !is_valid_identifier(name) {
        status.add_fatal_error(format!("`{name}` is not a valid Java identifier."));
        return status;
    }
    if name.chars().next().is_some_and(char::is_uppercase) {
        status.add_warning(format!(
            "By convention, {what} names start with a lowercase letter."
        ));
    }
    if name.contains('$') {
        status.add_warning(format!("By convention, {what} names do not contain `$`."));
    }
    status
}

/// FATAL for invalid names, WARNING for convention violations.
pub fn check_variable_name(name: &str) -> RefactoringStatus {
    check_identifier(name, "variable")
}

pub fn check_field_name(name: &str) -> RefactoringStatus {
    check_identifier(name, "field")
}

pub fn check_method_name(name: &str) -> RefactoringStatus {
    check_identifier(name, "method")
}

pub fn check_package_name(name: &str) -> RefactoringStatus {
    let mut status = RefactoringStatus::new();
    if name.is_empty() {
        status.add_fatal_error("Choose a package name.");
        return status;
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            status.add_fatal_error(format!("`{name}` is not a valid package name: empty segment."));
            return status;
        }
        if !is_valid_identifier(segment) {
            status.add_fatal_error(format!(
                "`{name}` is not a valid package name: `{segment}` is not a valid identifier."
            ));
            return status;
        }
    }
    if name.chars().any(char::is_uppercase) {
        status.add_warning("By convention, package names are all lowercase.");
    }
    status
}

/// A local name suggested by the shape of `expression`, not yet made unique.
///
/// `getFoo()` and `isFoo()` give `foo`, `new Foo()` gives `foo`, `a.b` and `b` give `b`,
/// string literals give `string` and other literals `value`.
pub fn guess_temp_name(expression: &str) -> String {
    let tokens = CodeTokens::new(expression);
    let n = tokens.tokens.len();
    let guess = match n {
        0 => None,
        1 => {
            let token = tokens.tokens[0];
            match token.kind {
                TokenKind::Identifier => Some(token.text(expression).to_string()),
                TokenKind::StringLiteral | TokenKind::TextBlock => Some("string".to_string()),
                kind if kind.is_literal() => Some("value".to_string()),
                TokenKind::Keyword if matches!(token.text(expression), "true" | "false") => {
                    Some("value".to_string())
                }
                _ => None,
            }
        }
        _ if tokens.text_at(0) == Some("new") => (1..n)
            .take_while(|&i| !matches!(tokens.text_at(i), Some("(" | "<" | "[" | "{")))
            .filter(|&i| tokens.tokens[i].kind == TokenKind::Identifier)
            .last()
            .and_then(|i| tokens.text_at(i))
            .map(decapitalize),
        _ if tokens.text_at(n - 1) == Some(")") => call_name_before_args(&tokens).map(|name| {
            accessor_property(name, "get")
                .or_else(|| accessor_property(name, "is"))
                .unwrap_or_else(|| name.to_string())
        }),
        _ if tokens.tokens[n - 1].kind == TokenKind::Identifier && tokens.prev_text(n - 1) == Some(".") => {
            tokens.text_at(n - 1).map(str::to_string)
        }
        _ => None,
    };
    guess
        .filter(|name| is_valid_identifier(name))
        .unwrap_or_else(|| FALLBACK_TEMP_NAME.to_string())
}

/// The method name of a trailing call `...name(args)`.
fn call_name_before_args<'a>(tokens: &CodeTokens<'a>) -> Option<&'a str> {
    let close = tokens.tokens.len() - 1;
    let open = (0..close)
        .rev()
        .find(|&i| tokens.text_at(i) == Some("(") && tokens.matching_close(i) == Some(close))?;
    let name_idx = open.checked_sub(1)?;
    let token = tokens.get(name_idx)?;
    (token.kind == TokenKind::Identifier).then(|| token.text(tokens.text))
}

/// `getFoo` with prefix `get` gives `foo`.
fn accessor_property(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    rest.chars()
        .next()
        .filter(|c| c.is_uppercase())
        .map(|_| decapitalize(rest))
}

/// Append 2, 3, ... to `name` until it is not in `taken`.
pub fn make_unique(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    (2..)
        .map(|i| format!("{name}{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn decapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `getFoo`, or `isFoo` for `boolean` fields.
pub fn getter_name(field: &str, ty: &str) -> String {
    let prefix = if ty == "boolean" { "is" } else { "get" };
    format!("{prefix}{}", capitalize(field))
}

pub fn setter_name(field: &str) -> String {
    format!("set{}", capitalize(field))
}
