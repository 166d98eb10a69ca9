use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use refract_core::{FileId, ProgressMonitor, TextEdit, TextRange, TextSize};
use refract_syntax::{ImportDecl, TokenKind};

use crate::change::{Change, CompositeChange, MoveFileChange};
use crate::model::ElementModel;
use crate::names::check_package_name;
use crate::refactoring::{RefactorError, Refactoring, RefactoringKind};
use crate::scanner::ScanFlags;
use crate::status::RefactoringStatus;
use crate::support::{textual_match_edits, writable_status, SourceUnit};
use crate::tokens::CodeTokens;

/// Renames a package: its declarations, the imports and qualified names referring to it, and
/// the directory of its compilation units.
pub struct RenamePackage {
    model: Arc<dyn ElementModel>,
    file: FileId,
    selection: TextRange,
    new_name: String,
    update_references: bool,
    update_textual_matches: bool,
    textual_flags: ScanFlags,
    old_name: Option<String>,
}

/// Edits and moves computed for one run.
#[derive(Default)]
struct Plan {
    edits: BTreeMap<FileId, (SourceUnit, Vec<TextEdit>)>,
    moves: Vec<(FileId, FileId)>,
    unmoved: Vec<FileId>,
}

impl RenamePackage {
    pub fn new(model: Arc<dyn ElementModel>, file: FileId, selection: TextRange) -> Self {
        Self {
            model,
            file,
            selection,
            new_name: String::new(),
            update_references: true,
            update_textual_matches: false,
            textual_flags: ScanFlags::default(),
            old_name: None,
        }
    }

    pub fn set_new_name(&mut self, name: impl Into<String>) {
        self.new_name = name.into();
    }

    pub fn new_name(&self) -> &str {
        &self.new_name
    }

    pub fn set_update_references(&mut self, on: bool) {
        self.update_references = on;
    }

    pub fn set_update_textual_matches(&mut self, on: bool) {
        self.update_textual_matches = on;
    }

    /// Regions searched for textual matches.
    pub fn set_textual_scan_flags(&mut self, flags: ScanFlags) {
        self.textual_flags = flags;
    }

    pub fn old_name(&self) -> Option<&str> {
        self.old_name.as_deref()
    }

    fn old(&self) -> Result<String, RefactorError> {
        self.old_name
            .clone()
            .ok_or_else(|| RefactorError::NotReady("activation was not checked".into()))
    }

    fn plan(&self, old: &str, monitor: &ProgressMonitor) -> Result<Plan, RefactorError> {
        let files = self.model.files();
        monitor.begin_task("Collecting references", files.len() as u64);
        let mut plan = Plan::default();
        for file in files {
            monitor.check_cancelled()?;
            let unit = SourceUnit::load(self.model.as_ref(), &file)?;
            let mut edits = Vec::new();
            let in_package = unit.syntax.package.as_ref().is_some_and(|p| p.name == old);
            if in_package {
                if let Some(package) = &unit.syntax.package {
                    edits.push(TextEdit::new(package.name_range, self.new_name.as_str()));
                }
                match moved_file_id(&file, old, &self.new_name) {
                    Some(to) => plan.moves.push((file.clone(), to)),
                    None => plan.unmoved.push(file.clone()),
                }
            }
            if self.update_references {
                for import in &unit.syntax.imports {
                    if let Some(range) = import_prefix(import, old) {
                        edits.push(TextEdit::new(range, self.new_name.as_str()));
                    }
                }
                edits.extend(
                    qualified_references(&unit, old)
                        .into_iter()
                        .map(|range| TextEdit::new(range, self.new_name.as_str())),
                );
            }
            if self.update_textual_matches {
                let whole = TextRange::up_to(TextSize::of(unit.text.as_str()));
                let textual = textual_match_edits(&unit.text, whole, old, &self.new_name, self.textual_flags, &edits);
                edits.extend(textual);
            }
            if !edits.is_empty() {
                plan.edits.insert(file, (unit, edits));
            }
            monitor.worked(1);
        }
        monitor.done();
        Ok(plan)
    }
}

/// The file id of `file` after moving it from the directory of package `old` to that of `new`,
/// if its directory mirrors the package name.
fn moved_file_id(file: &FileId, old: &str, new: &str) -> Option<FileId> {
    let parent = file.parent()?;
    let old_dir = old.replace('.', "/");
    let new_dir = new.replace('.', "/");
    let root = if parent == old_dir {
        ""
    } else {
        let prefix = parent.strip_suffix(old_dir.as_str())?;
        if !prefix.ends_with('/') {
            return None;
        }
        prefix
    };
    Some(FileId::new(format!("{root}{new_dir}/{}", file.file_name())))
}

/// The range of the `old` package prefix in `import`, when the import names the package itself
/// or one of its types.
fn import_prefix(import: &ImportDecl, old: &str) -> Option<TextRange> {
    let prefix = TextRange::at(import.path_range.start(), TextSize::of(old));
    if import.path == old {
        return import.is_wildcard.then_some(prefix);
    }
    let rest = import.path.strip_prefix(old)?.strip_prefix('.')?;
    rest.starts_with(|c: char| c.is_uppercase()).then_some(prefix)
}

/// Ranges of `old.Type` qualifiers in code outside the package and import declarations.
fn qualified_references(unit: &SourceUnit, old: &str) -> Vec<TextRange> {
    let tokens: CodeTokens<'_> = unit.tokens();
    let segments: Vec<&str> = old.split('.').collect();
    let header_end = unit
        .syntax
        .imports
        .iter()
        .map(|i| i.range.end())
        .chain(unit.syntax.package.as_ref().map(|p| p.range.end()))
        .max()
        .unwrap_or_default();

    let mut out = Vec::new();
    for idx in 0..tokens.tokens.len() {
        if tokens.tokens[idx].range.start() < header_end
            || !tokens.is_ident(idx, segments[0])
            || tokens.prev_text(idx) == Some(".")
        {
            continue;
        }
        let matches_rest = segments.iter().enumerate().skip(1).all(|(k, segment)| {
            tokens.text_at(idx + 2 * k - 1) == Some(".") && tokens.is_ident(idx + 2 * k, segment)
        });
        let last = idx + 2 * (segments.len() - 1);
        let followed_by_type = tokens.text_at(last + 1) == Some(".")
            && tokens.get(last + 2).is_some_and(|t| {
                t.kind == TokenKind::Identifier && t.text(&unit.text).starts_with(|c: char| c.is_uppercase())
            });
        if matches_rest && followed_by_type {
            out.push(tokens.span(idx, last));
        }
    }
    out
}

impl Refactoring for RenamePackage {
    fn name(&self) -> String {
        match &self.old_name {
            Some(old) => format!("Rename package `{old}` to `{}`", self.new_name),
            None => "Rename package".to_string(),
        }
    }

    fn kind(&self) -> RefactoringKind {
        RefactoringKind::RenamePackage
    }

    fn check_activation(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        monitor.begin_task("Checking preconditions", 1);
        let unit = SourceUnit::load(self.model.as_ref(), &self.file)?;
        let Some(package) = &unit.syntax.package else {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The default package cannot be renamed.",
            ));
        };
        if !package.range.contains_range(self.selection) {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "Select the package declaration.",
            ));
        }
        self.old_name = Some(package.name.clone());
        monitor.done();
        Ok(writable_status(self.model.as_ref(), &self.file))
    }

    fn check_input(&mut self, monitor: &ProgressMonitor) -> Result<RefactoringStatus, RefactorError> {
        let old = self.old()?;
        let mut status = check_package_name(&self.new_name);
        if status.has_fatal_error() {
            return Ok(status);
        }
        if self.new_name == old {
            return Ok(RefactoringStatus::create_fatal_error_status(
                "The new name is the same as the current name.",
            ));
        }
        for file in self.model.files() {
            monitor.check_cancelled()?;
            let unit = SourceUnit::load(self.model.as_ref(), &file)?;
            if unit.syntax.package.as_ref().is_some_and(|p| p.name == self.new_name) {
                return Ok(RefactoringStatus::create_fatal_error_status(format!(
                    "Package `{}` already exists.",
                    self.new_name
                )));
            }
        }

        let plan = self.plan(&old, monitor)?;
        for file in plan.edits.keys() {
            if !self.model.exists_and_writable(file) {
                status.add_error(format!("`{file}` is read-only."));
            }
        }
        for (_, to) in &plan.moves {
            if self.model.exists(to) {
                status.add_error(format!("`{to}` already exists."));
            }
        }
        for file in &plan.unmoved {
            status.add_info(format!(
                "`{file}` is not in a directory matching its package and is not moved."
            ));
        }
        Ok(status)
    }

    fn create_change(&mut self, monitor: &ProgressMonitor) -> Result<Box<dyn Change>, RefactorError> {
        let old = self.old()?;
        let plan = self.plan(&old, monitor)?;
        let mut composite = CompositeChange::new(self.name());
        let edit_count: usize = plan.edits.values().map(|(_, e)| e.len()).sum();
        for (file, (unit, edits)) in plan.edits {
            composite.add(unit.change(format!("Update `{file}`"), edits));
        }
        let moves = plan.moves.len();
        for (from, to) in plan.moves {
            composite.add(MoveFileChange::new(from, to));
        }
        tracing::debug!(target: "refract.refactor", %old, new = %self.new_name, edits = edit_count, moves, "rename package");
        Ok(Box::new(composite))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
