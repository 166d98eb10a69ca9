//! The element-model contract consumed by refactorings, with in-memory and filesystem
//! implementations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use refract_core::{FileId, TextRange};
use thiserror::Error;
use walkdir::WalkDir;

use crate::element::{resolve_in_source, ElementRef};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("file `{0}` does not exist")]
    NotFound(FileId),
    #[error("file `{0}` is read-only")]
    ReadOnly(FileId),
    #[error("`{0}` already exists")]
    AlreadyExists(FileId),
    #[error("no element at {range:?} in `{file}`")]
    NoElement { file: FileId, range: TextRange },
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source access and element resolution for a set of compilation units.
///
/// Implementations use interior mutability for writes: a refactoring run holds the model by
/// shared reference and assumes exclusive access for its duration.
pub trait ElementModel: Send + Sync {
    fn files(&self) -> Vec<FileId>;

    fn read_source(&self, file: &FileId) -> Result<String, ModelError>;

    fn write_source(&self, file: &FileId, text: String) -> Result<(), ModelError>;

    fn exists(&self, file: &FileId) -> bool;

    fn exists_and_writable(&self, file: &FileId) -> bool;

    /// Move `from` to `to`. Fails if `to` already exists.
    fn rename_file(&self, from: &FileId, to: &FileId) -> Result<(), ModelError>;

    fn resolve_element_at(&self, file: &FileId, range: TextRange) -> Result<ElementRef, ModelError> {
        let text = self.read_source(file)?;
        resolve_in_source(file, &text, range).ok_or_else(|| ModelError::NoElement {
            file: file.clone(),
            range,
        })
    }
}

#[derive(Clone, Debug)]
struct MemoryFile {
    text: String,
    read_only: bool,
}

/// In-memory model.
#[derive(Debug, Default)]
pub struct MemoryModel {
    files: RwLock<BTreeMap<FileId, MemoryFile>>,
}

impl MemoryModel {
    pub fn new(files: impl IntoIterator<Item = (FileId, String)>) -> Self {
        let files = files
            .into_iter()
            .map(|(id, text)| {
                (
                    id,
                    MemoryFile {
                        text,
                        read_only: false,
                    },
                )
            })
            .collect();
        Self {
            files: RwLock::new(files),
        }
    }

    pub fn insert(&self, file: FileId, text: impl Into<String>) {
        self.files.write().insert(
            file,
            MemoryFile {
                text: text.into(),
                read_only: false,
            },
        );
    }

    pub fn remove(&self, file: &FileId) -> Option<String> {
        self.files.write().remove(file).map(|f| f.text)
    }

    pub fn set_read_only(&self, file: &FileId, read_only: bool) {
        if let Some(entry) = self.files.write().get_mut(file) {
            entry.read_only = read_only;
        }
    }

    /// Current text of `file`, if present.
    pub fn text(&self, file: &FileId) -> Option<String> {
        self.files.read().get(file).map(|f| f.text.clone())
    }

    pub fn snapshot(&self) -> BTreeMap<FileId, String> {
        self.files
            .read()
            .iter()
            .map(|(id, f)| (id.clone(), f.text.clone()))
            .collect()
    }
}

impl ElementModel for MemoryModel {
    fn files(&self) -> Vec<FileId> {
        self.files.read().keys().cloned().collect()
    }

    fn read_source(&self, file: &FileId) -> Result<String, ModelError> {
        self.text(file).ok_or_else(|| ModelError::NotFound(file.clone()))
    }

    fn write_source(&self, file: &FileId, text: String) -> Result<(), ModelError> {
        let mut files = self.files.write();
        let entry = files
            .get_mut(file)
            .ok_or_else(|| ModelError::NotFound(file.clone()))?;
        if entry.read_only {
            return Err(ModelError::ReadOnly(file.clone()));
        }
        entry.text = text;
        Ok(())
    }

    fn exists(&self, file: &FileId) -> bool {
        self.files.read().contains_key(file)
    }

    fn exists_and_writable(&self, file: &FileId) -> bool {
        self.files.read().get(file).is_some_and(|f| !f.read_only)
    }

    fn rename_file(&self, from: &FileId, to: &FileId) -> Result<(), ModelError> {
        let mut files = self.files.write();
        if files.contains_key(to) {
            return Err(ModelError::AlreadyExists(to.clone()));
        }
        match files.get(from) {
            None => return Err(ModelError::NotFound(from.clone())),
            Some(entry) if entry.read_only => return Err(ModelError::ReadOnly(from.clone())),
            Some(_) => {}
        }
        if let Some(entry) = files.remove(from) {
            files.insert(to.clone(), entry);
        }
        Ok(())
    }
}

/// Java sources under a root directory. File ids are root-relative `/`-separated paths.
#[derive(Clone, Debug)]
pub struct FsModel {
    root: PathBuf,
}

impl FsModel {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file: &FileId) -> PathBuf {
        file.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// File id for `path`, if it lies under the root.
    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| FileId::new(parts.join("/")))
    }

    fn io_error(path: PathBuf, source: std::io::Error) -> ModelError {
        tracing::warn!(target: "refract.model", path = %path.display(), error = %source, "filesystem operation failed");
        ModelError::Io { path, source }
    }
}

impl ElementModel for FsModel {
    fn files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "java"))
            .filter_map(|entry| self.file_id(entry.path()))
            .collect();
        files.sort();
        files
    }

    fn read_source(&self, file: &FileId) -> Result<String, ModelError> {
        let path = self.path_of(file);
        if !path.is_file() {
            return Err(ModelError::NotFound(file.clone()));
        }
        fs::read_to_string(&path).map_err(|err| Self::io_error(path, err))
    }

    fn write_source(&self, file: &FileId, text: String) -> Result<(), ModelError> {
        if !self.exists(file) {
            return Err(ModelError::NotFound(file.clone()));
        }
        if !self.exists_and_writable(file) {
            return Err(ModelError::ReadOnly(file.clone()));
        }
        let path = self.path_of(file);
        fs::write(&path, text).map_err(|err| Self::io_error(path, err))
    }

    fn exists(&self, file: &FileId) -> bool {
        self.path_of(file).is_file()
    }

    fn exists_and_writable(&self, file: &FileId) -> bool {
        fs::metadata(self.path_of(file))
            .map(|meta| meta.is_file() && !meta.permissions().readonly())
            .unwrap_or(false)
    }

    fn rename_file(&self, from: &FileId, to: &FileId) -> Result<(), ModelError> {
        if !self.exists(from) {
            return Err(ModelError::NotFound(from.clone()));
        }
        let target = self.path_of(to);
        if target.exists() {
            return Err(ModelError::AlreadyExists(to.clone()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| Self::io_error(parent.to_path_buf(), err))?;
        }
        let source = self.path_of(from);
        fs::rename(&source, &target).map_err(|err| Self::io_error(source.clone(), err))?;

        // Remove the source directory if the move left it empty.
        if let Some(parent) = source.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }
}
