use std::collections::{BTreeMap, BTreeSet};

use refract_core::FileId;
use serde::Serialize;
use similar::TextDiff;

use crate::change::{Change, ChangeError};
use crate::model::ElementModel;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileChangeKind {
    Modified,
    Renamed { from: FileId, to: FileId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub file: FileId,
    pub change: FileChangeKind,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
    pub edit_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefactoringPreview {
    pub total_files: usize,
    pub total_edits: usize,
    pub file_moves: Vec<(FileId, FileId)>,
    pub files: Vec<FilePreview>,
}

fn text_or_empty<'a>(files: &'a BTreeMap<FileId, String>, file: &FileId) -> &'a str {
    files.get(file).map(String::as_str).unwrap_or("")
}

/// Describe what performing `change` would do, without touching `model`.
pub fn generate_preview(
    model: &dyn ElementModel,
    change: &dyn Change,
) -> Result<RefactoringPreview, ChangeError> {
    let mut original_files: BTreeMap<FileId, String> = BTreeMap::new();
    for file in change.affected_files() {
        let text = model.read_source(&file)?;
        original_files.insert(file, text);
    }

    let mut modified_files = original_files.clone();
    change.apply_to_snapshot(&mut modified_files)?;

    let file_moves = change.file_moves();
    let mut move_sources: BTreeMap<FileId, FileId> = BTreeMap::new();
    let mut current: BTreeMap<FileId, FileId> = BTreeMap::new();
    for (from, to) in &file_moves {
        let origin = current.remove(from).unwrap_or_else(|| from.clone());
        current.insert(to.clone(), origin);
    }
    for (to, origin) in current {
        if to != origin {
            move_sources.insert(to, origin);
        }
    }
    let moved_away: BTreeSet<&FileId> = move_sources.values().collect();

    let mut files = Vec::new();
    for (file, modified) in &modified_files {
        let (change_kind, original, header_from) = match move_sources.get(file) {
            Some(from) => (
                FileChangeKind::Renamed {
                    from: from.clone(),
                    to: file.clone(),
                },
                text_or_empty(&original_files, from),
                from,
            ),
            None => (
                FileChangeKind::Modified,
                text_or_empty(&original_files, file),
                file,
            ),
        };
        if moved_away.contains(file) && !move_sources.contains_key(file) {
            continue;
        }
        if original == modified && header_from == file {
            continue;
        }

        let diff = TextDiff::from_lines(original, modified.as_str());
        let unified_diff = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{header_from}"), &format!("b/{file}"))
            .to_string();

        let edit_count = if header_from == file {
            change.edit_count(file)
        } else {
            change.edit_count(header_from) + change.edit_count(file)
        };
        files.push(FilePreview {
            file: file.clone(),
            change: change_kind,
            original: original.to_string(),
            modified: modified.clone(),
            unified_diff,
            edit_count,
        });
    }

    let total_edits = original_files.keys().map(|file| change.edit_count(file)).sum();
    tracing::debug!(target: "refract.change", change = %change.name(), files = files.len(), total_edits, "generated preview");
    Ok(RefactoringPreview {
        total_files: files.len(),
        total_edits,
        file_moves,
        files,
    })
}
