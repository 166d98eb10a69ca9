//! Declaration structure of a Java compilation unit.
//!
//! This is not a Java parser. It recognises just enough structure (package, imports, types,
//! fields, methods, parameters, blocks, statements and local variables) to anchor refactorings,
//! and it never fails: unrecognised token runs are skipped. Every node owns its children; each
//! `parse_*` call returns the node it built.

use refract_core::{TextRange, TextSize};

use crate::lexer::{lex, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub text: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub name_range: TextRange,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Imported name without a trailing `.*`.
    pub path: String,
    pub path_range: TextRange,
    pub is_static: bool,
    pub is_wildcard: bool,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub name_range: TextRange,
    pub modifiers: Vec<Modifier>,
    pub range: TextRange,
    /// From `{` to `}` inclusive.
    pub body_range: TextRange,
    pub enum_constants: Vec<(String, TextRange)>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub initializers: Vec<Block>,
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub name_range: TextRange,
    pub ty: String,
    pub ty_range: TextRange,
    pub modifiers: Vec<Modifier>,
    pub initializer: Option<TextRange>,
    /// The whole declaration statement, shared by all declarators of `int a, b;`.
    pub range: TextRange,
    pub multi: bool,
    pub doc: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub name_range: TextRange,
    pub is_constructor: bool,
    pub modifiers: Vec<Modifier>,
    pub return_type: Option<String>,
    pub params: Vec<ParamDecl>,
    /// Between the parentheses, exclusive.
    pub params_range: TextRange,
    pub range: TextRange,
    pub body: Option<Block>,
    pub doc: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub ty: String,
    pub ty_range: TextRange,
    pub name: String,
    pub name_range: TextRange,
    pub range: TextRange,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// From `{` to `}` inclusive.
    pub range: TextRange,
    /// Direct child statements.
    pub statements: Vec<TextRange>,
    /// Locals declared by direct child statements (including `for`/`try`/`catch` headers).
    pub locals: Vec<LocalDecl>,
    /// Nested blocks, including lambda bodies.
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub ty: String,
    pub ty_range: TextRange,
    pub name: String,
    pub name_range: TextRange,
    pub initializer: Option<TextRange>,
    pub statement_range: TextRange,
    pub is_final: bool,
    pub multi: bool,
    /// Where the name is visible: from the declarator to the end of its block or statement.
    pub scope: TextRange,
}

impl SourceFile {
    /// All types, outer before inner.
    pub fn all_types(&self) -> Vec<&TypeDecl> {
        fn walk<'t>(types: &'t [TypeDecl], out: &mut Vec<&'t TypeDecl>) {
            for ty in types {
                out.push(ty);
                walk(&ty.types, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.types, &mut out);
        out
    }

    /// Innermost type whose declaration contains `offset`.
    pub fn type_at(&self, offset: TextSize) -> Option<&TypeDecl> {
        self.all_types()
            .into_iter()
            .filter(|ty| ty.range.contains(offset))
            .min_by_key(|ty| ty.range.len())
    }

    pub fn method_at(&self, offset: TextSize) -> Option<(&TypeDecl, &MethodDecl)> {
        let ty = self.type_at(offset)?;
        ty.methods
            .iter()
            .find(|m| m.range.contains(offset))
            .map(|m| (ty, m))
    }

    pub fn field_at(&self, offset: TextSize) -> Option<(&TypeDecl, &FieldDecl)> {
        let ty = self.type_at(offset)?;
        ty.fields
            .iter()
            .find(|f| f.name_range.contains_inclusive(offset))
            .or_else(|| ty.fields.iter().find(|f| f.range.contains(offset) && !f.multi))
            .map(|f| (ty, f))
    }
}

impl TypeDecl {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn methods_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s MethodDecl> + 's {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m.text == modifier)
    }

    /// Offset just before the closing `}` of the body.
    pub fn body_end(&self) -> TextSize {
        TextSize::from(u32::from(self.body_range.end()).saturating_sub(1))
    }
}

impl MethodDecl {
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m.text == modifier)
    }

    pub fn locals(&self) -> Vec<&LocalDecl> {
        self.body
            .as_ref()
            .map(Block::all_locals)
            .unwrap_or_default()
    }

    /// The innermost local named `name` visible at `offset`.
    pub fn local_in_scope(&self, name: &str, offset: TextSize) -> Option<&LocalDecl> {
        self.locals()
            .into_iter()
            .filter(|l| l.name == name && l.scope.contains_inclusive(offset))
            .max_by_key(|l| l.scope.start())
    }

    pub fn param(&self, name: &str) -> Option<(usize, &ParamDecl)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn statement_at(&self, offset: TextSize) -> Option<TextRange> {
        self.body.as_ref()?.statement_at(offset)
    }

    pub fn param_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.ty.as_str()).collect()
    }
}

impl Block {
    pub fn all_locals(&self) -> Vec<&LocalDecl> {
        let mut out: Vec<&LocalDecl> = self.locals.iter().collect();
        for block in &self.blocks {
            out.extend(block.all_locals());
        }
        out
    }

    /// The statement of the innermost block that contains `offset`.
    pub fn statement_at(&self, offset: TextSize) -> Option<TextRange> {
        for block in &self.blocks {
            if block.range.contains(offset) && block.range.start() != offset {
                if let Some(statement) = block.statement_at(offset) {
                    return Some(statement);
                }
            }
        }
        self.statements.iter().copied().find(|s| s.contains(offset))
    }

    /// The innermost block containing `offset` (this block included).
    pub fn block_at(&self, offset: TextSize) -> Option<&Block> {
        if !self.range.contains(offset) {
            return None;
        }
        self.blocks
            .iter()
            .find_map(|b| b.block_at(offset))
            .or(Some(self))
    }
}

const MODIFIER_KEYWORDS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "native",
    "synchronized",
    "transient",
    "volatile",
    "strictfp",
    "default",
];

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// Build the declaration structure of `text`.
pub fn parse(text: &str) -> SourceFile {
    let mut tokens = Vec::new();
    let mut docs = Vec::new();
    let mut pending_doc = None;
    for token in lex(text) {
        match token.kind {
            TokenKind::DocComment => pending_doc = Some(token.range),
            kind if kind.is_trivia() => {}
            _ => {
                tokens.push(token);
                docs.push(pending_doc.take());
            }
        }
    }
    Parser {
        src: text,
        tokens,
        docs,
        pos: 0,
    }
    .parse_file()
}

struct Modifiers {
    start: Option<TextSize>,
    list: Vec<Modifier>,
    doc: Option<TextRange>,
}

impl Modifiers {
    fn has(&self, text: &str) -> bool {
        self.list.iter().any(|m| m.text == text)
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    docs: Vec<Option<TextRange>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn text(&self, token: Token) -> &'a str {
        token.text(self.src)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(self.src, punct))
    }

    fn nth_is_punct(&self, n: usize, punct: &str) -> bool {
        self.nth(n).is_some_and(|t| t.is_punct(self.src, punct))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(self.src, keyword))
    }

    fn at_ident(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Identifier)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn prev_end(&self) -> TextSize {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.range.end(),
            None => TextSize::from(0),
        }
    }

    fn current_start(&self) -> TextSize {
        self.peek()
            .map(|t| t.range.start())
            .unwrap_or_else(|| self.prev_end())
    }

    fn skip_balanced(&mut self, open: &str, close: &str) {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            if token.is_punct(self.src, open) {
                depth += 1;
            } else if token.is_punct(self.src, close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
        }
    }

    fn parse_file(mut self) -> SourceFile {
        let mut file = SourceFile::default();
        while let Some(token) = self.peek() {
            if token.is_keyword(self.src, "package") {
                file.package = Some(self.parse_package());
            } else if token.is_keyword(self.src, "import") {
                file.imports.push(self.parse_import());
            } else {
                let before = self.pos;
                let modifiers = self.parse_modifiers();
                if self.at_type_keyword() {
                    if let Some(ty) = self.parse_type_decl(modifiers) {
                        file.types.push(ty);
                    }
                } else if self.pos == before {
                    self.bump();
                }
            }
        }
        file
    }

    fn parse_qualified_name(&mut self) -> Option<(String, TextRange)> {
        let first = self.peek().filter(|t| t.kind == TokenKind::Identifier)?;
        self.bump();
        let mut name = self.text(first).to_string();
        let mut end = first.range.end();
        while self.at_punct(".")
            && self
                .nth(1)
                .is_some_and(|t| t.kind == TokenKind::Identifier)
        {
            self.bump();
            if let Some(part) = self.bump() {
                name.push('.');
                name.push_str(self.text(part));
                end = part.range.end();
            }
        }
        Some((name, TextRange::new(first.range.start(), end)))
    }

    fn parse_package(&mut self) -> PackageDecl {
        let start = self.current_start();
        self.bump();
        let (name, name_range) = self
            .parse_qualified_name()
            .unwrap_or_else(|| (String::new(), TextRange::empty(self.current_start())));
        self.eat_punct(";");
        PackageDecl {
            name,
            name_range,
            range: TextRange::new(start, self.prev_end()),
        }
    }

    fn parse_import(&mut self) -> ImportDecl {
        let start = self.current_start();
        self.bump();
        let is_static = if self.at_keyword("static") {
            self.bump();
            true
        } else {
            false
        };
        let (path, path_range) = self
            .parse_qualified_name()
            .unwrap_or_else(|| (String::new(), TextRange::empty(self.current_start())));
        let is_wildcard = self.at_punct(".") && self.nth_is_punct(1, "*");
        if is_wildcard {
            self.pos += 2;
        }
        self.eat_punct(";");
        ImportDecl {
            path,
            path_range,
            is_static,
            is_wildcard,
            range: TextRange::new(start, self.prev_end()),
        }
    }

    fn skip_annotation(&mut self) {
        self.bump();
        let _ = self.parse_qualified_name();
        if self.at_punct("(") {
            self.skip_balanced("(", ")");
        }
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers {
            start: None,
            list: Vec::new(),
            doc: self.docs.get(self.pos).copied().flatten(),
        };
        while let Some(token) = self.peek() {
            let text = self.text(token);
            let is_annotation = token.is_punct(self.src, "@")
                && !self.nth(1).is_some_and(|t| t.is_keyword(self.src, "interface"));
            let is_modifier = (token.kind == TokenKind::Keyword
                && MODIFIER_KEYWORDS.contains(&text))
                || (token.kind == TokenKind::Identifier && text == "sealed");
            if !is_annotation && !is_modifier {
                break;
            }
            modifiers.start.get_or_insert(token.range.start());
            if is_annotation {
                self.skip_annotation();
            } else {
                modifiers.list.push(Modifier {
                    text: text.to_string(),
                    range: token.range,
                });
                self.bump();
            }
        }
        modifiers
    }

    fn at_type_keyword(&self) -> bool {
        let Some(token) = self.peek() else {
            return false;
        };
        token.is_keyword(self.src, "class")
            || token.is_keyword(self.src, "interface")
            || token.is_keyword(self.src, "enum")
            || (token.is_punct(self.src, "@")
                && self.nth(1).is_some_and(|t| t.is_keyword(self.src, "interface")))
            || (token.is_ident(self.src, "record")
                && self.nth(1).is_some_and(|t| t.kind == TokenKind::Identifier)
                && (self.nth_is_punct(2, "(") || self.nth_is_punct(2, "<")))
    }

    fn parse_type_decl(&mut self, modifiers: Modifiers) -> Option<TypeDecl> {
        let keyword = self.bump()?;
        let start = modifiers.start.unwrap_or(keyword.range.start());
        let kind = match self.text(keyword) {
            "class" => TypeKind::Class,
            "interface" => TypeKind::Interface,
            "enum" => TypeKind::Enum,
            "record" => TypeKind::Record,
            _ => {
                self.bump();
                TypeKind::Annotation
            }
        };
        let name = self.peek().filter(|t| t.kind == TokenKind::Identifier)?;
        self.bump();

        let mut decl = TypeDecl {
            kind,
            name: self.text(name).to_string(),
            name_range: name.range,
            modifiers: modifiers.list,
            range: TextRange::empty(start),
            body_range: TextRange::empty(start),
            enum_constants: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            initializers: Vec::new(),
            types: Vec::new(),
        };

        if self.at_punct("<") {
            self.skip_balanced("<", ">");
        }
        if kind == TypeKind::Record && self.at_punct("(") {
            let (components, _) = self.parse_params();
            decl.fields.extend(components.into_iter().map(|p| FieldDecl {
                name: p.name,
                name_range: p.name_range,
                ty: p.ty,
                ty_range: p.ty_range,
                modifiers: Vec::new(),
                initializer: None,
                range: p.range,
                multi: false,
                doc: None,
            }));
        }
        while let Some(token) = self.peek() {
            if token.is_punct(self.src, "{") || token.is_punct(self.src, ";") {
                break;
            }
            self.bump();
        }
        if !self.at_punct("{") {
            self.eat_punct(";");
            decl.range = TextRange::new(start, self.prev_end());
            return Some(decl);
        }

        let open = self.current_start();
        self.bump();
        self.parse_type_body(&mut decl);
        decl.body_range = TextRange::new(open, self.prev_end());
        decl.range = TextRange::new(start, self.prev_end());
        Some(decl)
    }

    fn parse_enum_constants(&mut self, decl: &mut TypeDecl) {
        while let Some(token) = self.peek() {
            if token.is_punct(self.src, ";") {
                self.bump();
                break;
            }
            if token.is_punct(self.src, "}") {
                break;
            }
            if token.is_punct(self.src, "@") {
                self.skip_annotation();
                continue;
            }
            if token.kind == TokenKind::Identifier {
                decl.enum_constants
                    .push((self.text(token).to_string(), token.range));
                self.bump();
                if self.at_punct("(") {
                    self.skip_balanced("(", ")");
                }
                if self.at_punct("{") {
                    self.skip_balanced("{", "}");
                }
                continue;
            }
            self.bump();
        }
    }

    fn parse_type_body(&mut self, decl: &mut TypeDecl) {
        if decl.kind == TypeKind::Enum {
            self.parse_enum_constants(decl);
        }
        while let Some(token) = self.peek() {
            if token.is_punct(self.src, "}") {
                self.bump();
                return;
            }
            if token.is_punct(self.src, ";") {
                self.bump();
                continue;
            }

            let before = self.pos;
            let modifiers = self.parse_modifiers();
            if self.at_punct("{") {
                let block = self.parse_block();
                decl.initializers.push(block);
                continue;
            }
            if self.at_type_keyword() {
                if let Some(ty) = self.parse_type_decl(modifiers) {
                    decl.types.push(ty);
                }
                continue;
            }
            if self.at_punct("<") {
                self.skip_balanced("<", ">");
            }

            let is_constructor = self
                .peek()
                .is_some_and(|t| t.is_ident(self.src, &decl.name))
                && self.nth_is_punct(1, "(");
            if is_constructor {
                let method = self.parse_method(modifiers, None);
                decl.methods.push(method);
                continue;
            }

            let Some(ty) = self.parse_type() else {
                if self.pos == before {
                    self.bump();
                }
                continue;
            };
            if !self.at_ident() {
                continue;
            }
            if self.nth_is_punct(1, "(") {
                let method = self.parse_method(modifiers, Some(ty));
                decl.methods.push(method);
            } else {
                let fields = self.parse_field_declarators(modifiers, ty);
                decl.fields.extend(fields);
            }
        }
    }

    /// A type reference: primitive or qualified name with generic arguments and array dims.
    /// Restores the position and returns `None` when the tokens do not form a type.
    fn parse_type(&mut self) -> Option<(String, TextRange)> {
        let saved = self.pos;
        let first = self.peek()?;
        let is_start = first.kind == TokenKind::Identifier
            || (first.kind == TokenKind::Keyword && PRIMITIVES.contains(&self.text(first)));
        if !is_start {
            return None;
        }
        self.bump();
        loop {
            if self.at_punct(".")
                && self
                    .nth(1)
                    .is_some_and(|t| t.kind == TokenKind::Identifier)
            {
                self.pos += 2;
            } else if self.at_punct("<") {
                if !self.parse_type_arguments() {
                    self.pos = saved;
                    return None;
                }
            } else {
                break;
            }
        }
        while self.at_punct("[") && self.nth_is_punct(1, "]") {
            self.pos += 2;
        }
        let range = TextRange::new(first.range.start(), self.prev_end());
        Some((self.src[range].to_string(), range))
    }

    fn parse_type_arguments(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            let text = self.text(token);
            let allowed = match token.kind {
                TokenKind::Identifier => true,
                TokenKind::Keyword => {
                    PRIMITIVES.contains(&text) || text == "extends" || text == "super"
                }
                TokenKind::Punct => matches!(text, "<" | ">" | "," | "." | "?" | "[" | "]" | "&"),
                _ => false,
            };
            if !allowed {
                return false;
            }
            self.bump();
            if text == "<" {
                depth += 1;
            } else if text == ">" {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return true;
                }
            }
        }
        false
    }

    fn parse_field_declarators(&mut self, modifiers: Modifiers, ty: (String, TextRange)) -> Vec<FieldDecl> {
        let start = modifiers.start.unwrap_or(ty.1.start());
        let mut fields = Vec::new();
        let mut ignored = Vec::new();
        while let Some(name) = self.peek().filter(|t| t.kind == TokenKind::Identifier) {
            self.bump();
            while self.at_punct("[") && self.nth_is_punct(1, "]") {
                self.pos += 2;
            }
            let initializer = if self.eat_punct("=") {
                Some(self.scan_expression(&[",", ";"], &mut ignored))
            } else {
                None
            };
            fields.push(FieldDecl {
                name: self.text(name).to_string(),
                name_range: name.range,
                ty: ty.0.clone(),
                ty_range: ty.1,
                modifiers: modifiers.list.clone(),
                initializer,
                range: TextRange::empty(start),
                multi: false,
                doc: modifiers.doc,
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
        let range = TextRange::new(start, self.prev_end());
        let multi = fields.len() > 1;
        for field in &mut fields {
            field.range = range;
            field.multi = multi;
        }
        fields
    }

    fn parse_method(&mut self, modifiers: Modifiers, return_type: Option<(String, TextRange)>) -> MethodDecl {
        let is_constructor = return_type.is_none();
        let start = modifiers
            .start
            .or(return_type.as_ref().map(|t| t.1.start()))
            .unwrap_or_else(|| self.current_start());
        let name = self.bump();
        let (params, params_range) = self.parse_params();
        while self.at_punct("[") && self.nth_is_punct(1, "]") {
            self.pos += 2;
        }
        if self.at_keyword("throws") || self.at_keyword("default") {
            while let Some(token) = self.peek() {
                if token.is_punct(self.src, "{") || token.is_punct(self.src, ";") {
                    break;
                }
                if token.is_punct(self.src, "(") {
                    self.skip_balanced("(", ")");
                } else {
                    self.bump();
                }
            }
        }
        let body = if self.at_punct("{") {
            Some(self.parse_block())
        } else {
            self.eat_punct(";");
            None
        };
        let (name, name_range) = match name {
            Some(token) => (self.text(token).to_string(), token.range),
            None => (String::new(), TextRange::empty(start)),
        };
        MethodDecl {
            name,
            name_range,
            is_constructor,
            modifiers: modifiers.list,
            return_type: return_type.map(|t| t.0),
            params,
            params_range,
            range: TextRange::new(start, self.prev_end()),
            body,
            doc: modifiers.doc,
        }
    }

    fn parse_params(&mut self) -> (Vec<ParamDecl>, TextRange) {
        let inner_start = self.peek().map(|t| t.range.end()).unwrap_or_default();
        self.bump();
        let mut params = Vec::new();
        while let Some(token) = self.peek() {
            if token.is_punct(self.src, ")") {
                break;
            }
            if let Some(param) = self.parse_param() {
                params.push(param);
            }
            // Skip anything unrecognised up to the next separator.
            let mut depth = 0usize;
            while let Some(token) = self.peek() {
                let text = self.text(token);
                if token.kind == TokenKind::Punct {
                    if depth == 0 && (text == "," || text == ")") {
                        break;
                    }
                    match text {
                        "(" | "<" | "[" => depth += 1,
                        ")" | ">" | "]" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                }
                self.bump();
            }
            self.eat_punct(",");
        }
        let inner_end = self.current_start();
        self.eat_punct(")");
        (params, TextRange::new(inner_start, inner_end.max(inner_start)))
    }

    fn parse_param(&mut self) -> Option<ParamDecl> {
        let start = self.current_start();
        let modifiers = self.parse_modifiers();
        let (ty, ty_range) = self.parse_type()?;
        let mut ty = ty;
        let mut ty_range = ty_range;
        if self.at_punct("...") {
            let dots = self.bump()?;
            ty_range = TextRange::new(ty_range.start(), dots.range.end());
            ty = self.src[ty_range].to_string();
        }
        let name = self.peek().filter(|t| t.kind == TokenKind::Identifier)?;
        self.bump();
        Some(ParamDecl {
            ty,
            ty_range,
            name: self.text(name).to_string(),
            name_range: name.range,
            range: TextRange::new(start, self.prev_end()),
            is_final: modifiers.has("final"),
        })
    }

    fn parse_block(&mut self) -> Block {
        let open = self.current_start();
        self.bump();
        let mut block = Block {
            range: TextRange::empty(open),
            statements: Vec::new(),
            locals: Vec::new(),
            blocks: Vec::new(),
        };
        let mut close = None;
        while let Some(token) = self.peek() {
            if token.is_punct(self.src, "}") {
                close = Some(token.range.start());
                self.bump();
                break;
            }
            let start = token.range.start();
            let before = self.pos;
            self.statement(&mut block);
            if self.pos == before {
                self.bump();
            }
            block.statements.push(TextRange::new(start, self.prev_end()));
        }
        let scope_end = close.unwrap_or_else(|| self.prev_end());
        for local in &mut block.locals {
            if local.scope.is_empty() {
                local.scope = TextRange::new(local.scope.start(), scope_end);
            }
        }
        block.range = TextRange::new(open, self.prev_end());
        block
    }

    /// Consume one statement, recording nested blocks and declared locals into `block`.
    fn statement(&mut self, block: &mut Block) {
        let Some(token) = self.peek() else {
            return;
        };
        let text = self.text(token);

        if token.is_punct(self.src, "{") {
            let nested = self.parse_block();
            block.blocks.push(nested);
            return;
        }
        if token.is_punct(self.src, ";") {
            self.bump();
            return;
        }

        if token.kind == TokenKind::Keyword {
            match text {
                "if" | "while" | "synchronized" => {
                    self.bump();
                    self.scan_parens(block);
                    self.statement(block);
                    if text == "if" && self.at_keyword("else") {
                        self.bump();
                        self.statement(block);
                    }
                    return;
                }
                "switch" => {
                    self.bump();
                    self.scan_parens(block);
                    if self.at_punct("{") {
                        let body = self.parse_block();
                        block.blocks.push(body);
                    }
                    return;
                }
                "do" => {
                    self.bump();
                    self.statement(block);
                    if self.at_keyword("while") {
                        self.bump();
                        self.scan_parens(block);
                    }
                    self.eat_punct(";");
                    return;
                }
                "for" => {
                    self.for_statement(block);
                    return;
                }
                "try" => {
                    self.try_statement(block);
                    return;
                }
                "class" | "interface" | "enum" => {
                    while let Some(token) = self.peek() {
                        if token.is_punct(self.src, "{") {
                            self.skip_balanced("{", "}");
                            break;
                        }
                        self.bump();
                    }
                    return;
                }
                _ => {}
            }
        }

        if token.kind == TokenKind::Identifier && self.nth_is_punct(1, ":") {
            self.pos += 2;
            self.statement(block);
            return;
        }

        let start = token.range.start();
        if let Some(mut locals) = self.local_declaration(&mut block.blocks) {
            self.eat_punct(";");
            let statement_range = TextRange::new(start, self.prev_end());
            for local in &mut locals {
                local.statement_range = statement_range;
            }
            block.locals.extend(locals);
            return;
        }

        self.scan_expression(&[";"], &mut block.blocks);
        self.eat_punct(";");
    }

    fn for_statement(&mut self, block: &mut Block) {
        self.bump();
        let mut header_locals = Vec::new();
        if self.at_punct("(") {
            self.bump();
            let start = self.current_start();
            if let Some(mut locals) = self.local_declaration(&mut block.blocks) {
                let statement_range = TextRange::new(start, self.prev_end());
                for local in &mut locals {
                    local.statement_range = statement_range;
                }
                header_locals = locals;
            }
            loop {
                self.scan_expression(&[], &mut block.blocks);
                if !self.eat_punct(";") {
                    break;
                }
            }
            self.eat_punct(")");
        }
        self.statement(block);
        let end = self.prev_end();
        for mut local in header_locals {
            local.scope = TextRange::new(local.scope.start(), end);
            block.locals.push(local);
        }
    }

    fn try_statement(&mut self, block: &mut Block) {
        self.bump();
        let mut resources = Vec::new();
        if self.at_punct("(") {
            self.bump();
            while self.peek().is_some() && !self.at_punct(")") {
                let start = self.current_start();
                let before = self.pos;
                if let Some(mut locals) = self.local_declaration(&mut block.blocks) {
                    let statement_range = TextRange::new(start, self.prev_end());
                    for local in &mut locals {
                        local.statement_range = statement_range;
                    }
                    resources.extend(locals);
                } else {
                    self.scan_expression(&[";"], &mut block.blocks);
                }
                self.eat_punct(";");
                if self.pos == before {
                    self.bump();
                }
            }
            self.eat_punct(")");
        }
        if self.at_punct("{") {
            let body = self.parse_block();
            block.blocks.push(body);
        }
        while self.at_keyword("catch") {
            self.bump();
            let mut param = None;
            if self.at_punct("(") {
                let clause_start = self.current_start();
                self.bump();
                let modifiers = self.parse_modifiers();
                if let Some((mut ty, mut ty_range)) = self.parse_type() {
                    while self.at_punct("|") {
                        self.bump();
                        if let Some((_, alt)) = self.parse_type() {
                            ty_range = TextRange::new(ty_range.start(), alt.end());
                            ty = self.src[ty_range].to_string();
                        }
                    }
                    if let Some(name) = self.peek().filter(|t| t.kind == TokenKind::Identifier) {
                        self.bump();
                        param = Some(LocalDecl {
                            ty,
                            ty_range,
                            name: self.text(name).to_string(),
                            name_range: name.range,
                            initializer: None,
                            statement_range: TextRange::empty(clause_start),
                            is_final: modifiers.has("final"),
                            multi: false,
                            scope: TextRange::empty(name.range.start()),
                        });
                    }
                }
                self.scan_expression(&[], &mut block.blocks);
                self.eat_punct(")");
                if let Some(param) = param.as_mut() {
                    param.statement_range = TextRange::new(clause_start, self.prev_end());
                }
            }
            if self.at_punct("{") {
                let body = self.parse_block();
                if let Some(mut param) = param {
                    param.scope = TextRange::new(param.scope.start(), body.range.end());
                    block.locals.push(param);
                }
                block.blocks.push(body);
            }
        }
        if self.at_keyword("finally") {
            self.bump();
            if self.at_punct("{") {
                let body = self.parse_block();
                block.blocks.push(body);
            }
        }
        let end = self.prev_end();
        for mut local in resources {
            local.scope = TextRange::new(local.scope.start(), end);
            block.locals.push(local);
        }
    }

    /// `[final] Type name [= init] (, name [= init])*`, without the terminator.
    ///
    /// Restores the position and returns `None` when the statement is not a declaration.
    /// Scopes are left empty at the declarator start for the caller to close.
    fn local_declaration(&mut self, lambdas: &mut Vec<Block>) -> Option<Vec<LocalDecl>> {
        let saved = self.pos;
        let modifiers = self.parse_modifiers();
        let Some((ty, ty_range)) = self.parse_type() else {
            self.pos = saved;
            return None;
        };
        let declarator_follows = ty != "yield"
            && self.at_ident()
            && matches!(
                self.nth(1).map(|t| self.text(t)),
                Some("=" | ";" | "," | "[" | ":")
            );
        if !declarator_follows {
            self.pos = saved;
            return None;
        }

        let mut locals = Vec::new();
        while let Some(name) = self.peek().filter(|t| t.kind == TokenKind::Identifier) {
            self.bump();
            while self.at_punct("[") && self.nth_is_punct(1, "]") {
                self.pos += 2;
            }
            let initializer = if self.eat_punct("=") {
                Some(self.scan_expression(&[",", ";"], lambdas))
            } else {
                None
            };
            locals.push(LocalDecl {
                ty: ty.clone(),
                ty_range,
                name: self.text(name).to_string(),
                name_range: name.range,
                initializer,
                statement_range: TextRange::empty(name.range.start()),
                is_final: modifiers.has("final"),
                multi: false,
                scope: TextRange::empty(name.range.start()),
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        let multi = locals.len() > 1;
        for local in &mut locals {
            local.multi = multi;
        }
        Some(locals)
    }

    fn scan_parens(&mut self, block: &mut Block) {
        if self.at_punct("(") {
            self.bump();
            self.scan_expression(&[], &mut block.blocks);
            self.eat_punct(")");
        }
    }

    /// Skip an expression up to (not including) a depth-0 token in `stops` or an unmatched
    /// closer. Lambda block bodies are parsed into `lambdas`.
    fn scan_expression(&mut self, stops: &[&str], lambdas: &mut Vec<Block>) -> TextRange {
        let start = self.current_start();
        let mut end = start;
        let mut depth = 0usize;
        let mut prev_arrow = false;
        while let Some(token) = self.peek() {
            let text = self.text(token);
            if token.kind == TokenKind::Punct {
                if depth == 0 && stops.contains(&text) {
                    break;
                }
                match text {
                    "(" | "[" => depth += 1,
                    ")" | "]" => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    "}" => break,
                    ";" if depth == 0 => break,
                    "{" => {
                        if prev_arrow {
                            let body = self.parse_block();
                            end = body.range.end();
                            lambdas.push(body);
                        } else {
                            self.skip_balanced("{", "}");
                            end = self.prev_end();
                        }
                        prev_arrow = false;
                        continue;
                    }
                    _ => {}
                }
            }
            prev_arrow = token.is_punct(self.src, "->");
            end = token.range.end();
            self.bump();
        }
        TextRange::new(start, end)
    }
}
