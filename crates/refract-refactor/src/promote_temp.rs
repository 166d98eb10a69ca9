use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange, TextSize};
use refract_syntax::{LocalDecl, MethodDecl, TokenKind, TypeDecl};
use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::element::ElementKind;
use crate::model::ElementModel;
use crate::names::check_field_name;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::status::RefactoringStatus;
use crate::support::{
    binding_at, is_statement_local, variable_references, writable_status, SourceUnit, Variable,
};

/// Where a promoted local's initializer ends up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializeIn {
    /// An assignment replaces the declaration inside the method.
    #[default]
    Method,
    /// The field declaration carries the initializer.
    Field,
    /// Every constructor assigns the field.
    Constructor,
}

impl FromStr for InitializeIn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "method" => Ok(InitializeIn::Method),
            "field" => Ok(InitializeIn::Field),
            "constructor" => Ok(InitializeIn::Constructor),
            other => Err(format!("unknown initialization place `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    PackagePrivate,
    #[default]
    Private,
}

impl Visibility {
    /// The modifier keyword, empty for package-private.
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::PackagePrivate => "",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::PackagePrivate => f.write_str("package"),
            other => f.write_str(other.keyword()),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "protected" => Ok(Visibility::Protected),
            "package" | "" => Ok(Visibility::PackagePrivate),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility `{other}`")),
        }
    }
}

/// Turns a local variable into a field of the enclosing type.
pub struct PromoteTempToField {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    field_name: String,
    visibility: Visibility,
    declare_static: bool,
    declare_final: bool,
    initialize_in: InitializeIn,
    /// Name and declaration name range of the local.
    local: Option<(String, TextRange)>,
}

impl PromoteTempToField {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            field_name: String::new(),
            visibility: Visibility::Private,
            declare_static: false,
            declare_final: false,
            initialize_in: InitializeIn::Method,
            local: None,
        }
    }

    pub fn set_field_name(&mut self, name: impl Into<String>) {
        self.field_name = name.into();
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    pub fn set_declare_static(&mut self, on: bool) {
        self.declare_static = on;
    }

    pub fn set_declare_final(&mut self, on: bool) {
        self.declare_final = on;
    }

    pub fn set_initialize_in(&mut self, place: InitializeIn) {
        self.initialize_in = place;
    }

    fn local(&self) -> Result<(String, TextRange), RefactorError> {
        self.local
            .clone()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }

    fn field_declaration(&self, local: &LocalDecl, initializer: Option<&str>) -> String {
        let mut decl = String::new();
        for modifier in [
            self.visibility.keyword(),
            if self.declare_static { "static" } else { "" },
            if self.declare_final { "final" } else { "" },
        ] {
            if !modifier.is_empty() {
                decl.push_str(modifier);
                decl.push(' ');
            }
        }
        decl.push_str(&local.ty);
        decl.push(' ');
        decl.push_str(&self.field_name);
        if let Some(init) = initializer {
            decl.push_str(" = ");
            decl.push_str(init);
        }
        decl.push(';');
        decl
    }
}

fn find_local<'u>(unit: &'u SourceUnit, name_range: TextRange) -> Option<(&'u TypeDecl, &'u MethodDecl, &'u LocalDecl)> {
    let (ty, method) = unit.syntax.method_at(name_range.start())?;
    let local = method
        .locals()
        .into_iter()
        .find(|l| l.name_range == name_range)?;
    Some((ty, method, local))
}

/// Whether `range` mentions a local or parameter of `method` other than `except`.
fn uses_method_variables(unit: &SourceUnit, method: &MethodDecl, range: TextRange, except: &str) -> bool {
    let tokens = unit.tokens();
    tokens.indices_in(range).any(|idx| {
        let Some(token) = tokens.get(idx) else {
            return false;
        };
        let name = token.text(&unit.text);
        name != except
            && token.kind == TokenKind::Identifier
            && !tokens.is_qualified(idx)
            && !tokens.is_call(idx)
            && binding_at(method, name, token.range.start()).is_some()
    })
}

impl Refactoring for PromoteTempToField {
    fn name(&self) -> String {
        match &self.local {
            Some((name, _)) => format!("Convert local variable `{name}` to field"),
            None => "Convert local variable to field".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::PromoteTempToField
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let element = match self.model.resolve_element_at(&self.file, self.selection) {
            Ok(element) if element.kind == ElementKind::LocalVariable => element,
            _ => {
                return Ok(RefactoringStatus::create_fatal_error_status(
                    "Select a local variable declaration or reference.",
                ))
            }
        };
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((_, method, local)) = find_local(&unit, element.range) else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The selected variable cannot be resolved.",
            ));
        };
        if !is_statement_local(method, local) {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is declared in a loop header, resource specification or catch clause.",
                local.name
            )));
        }
        if local.multi {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "`{}` is declared together with other variables.",
                local.name
            )));
        }
        if local.ty == "var" {
            return Ok(RefactoringStatus::create_fatal_error_status(format!(
                "The type of `{}` is inferred and cannot be used for a field.",
                local.name
            )));
        }

        let status = writable_status(self.model.as_ref(), &self.file);
        if method.has_modifier("static") {
            self.declare_static = true;
        }
        if self.field_name.is_empty() {
            self.field_name = local.name.clone();
        }
        self.local = Some((local.name.clone(), local.name_range));
        monitor.done();
        Ok(status)
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let (name, name_range) = self.local()?;
        let mut status = check_field_name(&self.field_name);
        if status.has_fatal_error() {
            return Ok(status);
        }
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some((ty, method, local)) = find_local(&unit, name_range) else {
            return Ok(RefactoringStatus::create_fatal_error_status("The variable no longer exists."));
        };

        if ty.field(&self.field_name).is_some() {
            status.add_error(format!(
                "`{}` already declares a field named `{}`.",
                ty.name, self.field_name
            ));
        }
        if self.field_name != name
            && (method.param(&self.field_name).is_some()
                || method.locals().iter().any(|l| l.name == self.field_name))
        {
            status.add_warning(format!(
                "A variable named `{}` in `{}` shadows the new field.",
                self.field_name, method.name
            ));
        }
        if method.has_modifier("static") && !self.declare_static {
            self.declare_static = true;
            status.add_info("The enclosing method is static, so the field is declared static.");
        }
        if self.declare_final && self.initialize_in == InitializeIn::Method {
            status.add_error("A final field cannot be initialized in a method.");
        }
        if self.initialize_in == InitializeIn::Constructor && self.declare_static {
            status.add_error("A static field cannot be initialized in a constructor.");
        }
        if self.initialize_in != InitializeIn::Method {
            if let Some(init) = local.initializer {
                if uses_method_variables(&unit, method, init, &name) {
                    status.add_error(format!(
                        "The initializer of `{name}` uses local variables or parameters and must stay in the method."
                    ));
                }
            } else if self.declare_final {
                status.add_error(format!("`{name}` has no initializer to initialize the final field with."));
            }
        }
        monitor.done();
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let (name, name_range) = self.local()?;
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let (ty, method, local) = find_local(&unit, name_range)
            .ok_or_else(|| RefactorError::NotReady("the variable no longer exists".into()))?;
        let tokens = unit.tokens();
        let le = unit.le();
        let unit_indent = unit.indent_unit();
        let member_indent = unit.indent_at(method.range.start()).to_string();
        let init_text = local.initializer.map(|r| unit.text[r].to_string());

        let mut edits = Vec::new();

        // Field declaration, and generated constructor if needed, right after the opening brace.
        let field_init = match self.initialize_in {
            InitializeIn::Field => init_text.as_deref(),
            _ => None,
        };
        let mut member_text = format!("{le}{member_indent}{}", self.field_declaration(local, field_init));
        let constructors: Vec<&MethodDecl> = ty.methods.iter().filter(|m| m.is_constructor).collect();
        let assignment = init_text
            .as_deref()
            .map(|init| format!("{} = {init};", self.field_name));
        if self.initialize_in == InitializeIn::Constructor {
            if let Some(assignment) = &assignment {
                if constructors.is_empty() {
                    member_text.push_str(&format!(
                        "{le}{le}{member_indent}public {}() {{{le}{member_indent}{unit_indent}{assignment}{le}{member_indent}}}{le}",
                        ty.name
                    ));
                } else {
                    let body_indent = format!("{member_indent}{unit_indent}");
                    for body in constructors.iter().filter_map(|c| c.body.as_ref()) {
                        edits.push(TextEdit::insert(
                            body.range.start() + TextSize::from(1),
                            format!("{le}{body_indent}{assignment}"),
                        ));
                    }
                }
            }
        }
        let body_open = ty.body_range.start() + TextSize::from(1);
        edits.push(TextEdit::insert(body_open, member_text));

        // The local declaration becomes an assignment or disappears.
        let statement = local.statement_range;
        match (self.initialize_in, &assignment) {
            (InitializeIn::Method, Some(assignment)) => {
                edits.push(TextEdit::new(statement, assignment.clone()));
            }
            _ => edits.push(TextEdit::delete(unit.deletion_range(statement))),
        }

        if self.field_name != name {
            for idx in variable_references(&tokens, method, &name, Variable::Local(local.name_range)) {
                let range = tokens.tokens[idx].range;
                if !statement.contains_range(range) {
                    edits.push(TextEdit::new(range, self.field_name.clone()));
                }
            }
        }

        monitor.worked(1);
        tracing::debug!(target: "refract.refactor", local = %name, field = %self.field_name, place = ?self.initialize_in, "promote temp");
        Ok(Box::new(unit.change(self.name(), edits)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
