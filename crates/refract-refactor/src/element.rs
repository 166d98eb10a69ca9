use refract_core::{FileId, TextRange};
use refract_syntax::{parse, SourceFile};
use serde::{Deserialize, Serialize};

use crate::tokens::CodeTokens;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Package,
    Type,
    Field,
    Method,
    Parameter,
    LocalVariable,
    Expression,
}

/// A program element picked by a selection.
///
/// For named elements `range` is the name at the declaration site; for expressions it is the
/// selected expression itself, trimmed to whole tokens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub file: FileId,
    pub range: TextRange,
    pub name: String,
    pub kind: ElementKind,
}

/// Resolve `range` in `text` to the element it designates.
pub fn resolve_in_source(file: &FileId, text: &str, range: TextRange) -> Option<ElementRef> {
    let syntax = parse(text);
    let tokens = CodeTokens::new(text);
    let element = |range: TextRange, name: &str, kind: ElementKind| ElementRef {
        file: file.clone(),
        range,
        name: name.to_string(),
        kind,
    };

    if let Some(package) = &syntax.package {
        if package.name_range.contains_range(range) {
            return Some(element(package.name_range, &package.name, ElementKind::Package));
        }
    }

    let Some(idx) = tokens.identifier_at(range) else {
        let covered = tokens.indices_in(range);
        if covered.is_empty() {
            return None;
        }
        let trimmed = tokens.span(covered.start, covered.end - 1);
        return Some(element(trimmed, &text[trimmed], ElementKind::Expression));
    };
    let token = tokens.tokens[idx];
    let name = token.text(text);
    let offset = token.range.start();

    if let Some(kind) = declaration_kind(&syntax, token.range) {
        return Some(element(token.range, name, kind));
    }

    if let Some((ty, method)) = syntax.method_at(offset) {
        if !tokens.is_qualified(idx) {
            if let Some(local) = method.local_in_scope(name, offset) {
                return Some(element(local.name_range, name, ElementKind::LocalVariable));
            }
            if let Some((_, param)) = method.param(name) {
                return Some(element(param.name_range, name, ElementKind::Parameter));
            }
        }
        if tokens.is_call(idx) {
            if let Some(target) = ty.methods_named(name).next() {
                return Some(element(target.name_range, name, ElementKind::Method));
            }
        } else if !tokens.is_qualified(idx) || tokens.is_this_qualified(idx) {
            if let Some(field) = ty.field(name) {
                return Some(element(field.name_range, name, ElementKind::Field));
            }
        }
    }
    if let Some(ty) = syntax.all_types().into_iter().find(|t| t.name == name) {
        return Some(element(ty.name_range, name, ElementKind::Type));
    }
    Some(element(token.range, name, ElementKind::Expression))
}

fn declaration_kind(syntax: &SourceFile, name_range: TextRange) -> Option<ElementKind> {
    for ty in syntax.all_types() {
        if ty.name_range == name_range {
            return Some(ElementKind::Type);
        }
        if ty.fields.iter().any(|f| f.name_range == name_range) {
            return Some(ElementKind::Field);
        }
        for method in &ty.methods {
            if method.name_range == name_range {
                return Some(ElementKind::Method);
            }
            if method.params.iter().any(|p| p.name_range == name_range) {
                return Some(ElementKind::Parameter);
            }
            if method.locals().iter().any(|l| l.name_range == name_range) {
                return Some(ElementKind::LocalVariable);
            }
        }
    }
    None
}
