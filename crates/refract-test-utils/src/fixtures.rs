use std::collections::HashMap;
use std::fs;

use refract_core::{FileId, TextRange, TextSize};
use tempfile::TempDir;

/// Extracts a byte range selection from a fixture containing `/*start*/` and
/// `/*end*/` markers.
///
/// Returns the fixture with markers removed and the selection `TextRange`
/// pointing at the extracted region.
pub fn extract_range(fixture: &str) -> (String, TextRange) {
    let start_marker = "/*start*/";
    let end_marker = "/*end*/";

    let start = fixture
        .find(start_marker)
        .expect("fixture missing /*start*/ marker");
    let after_start = start + start_marker.len();
    let end = fixture
        .find(end_marker)
        .expect("fixture missing /*end*/ marker");
    assert!(end >= after_start, "/*end*/ must come after /*start*/");

    let mut text = String::with_capacity(fixture.len());
    text.push_str(&fixture[..start]);
    text.push_str(&fixture[after_start..end]);
    text.push_str(&fixture[end + end_marker.len()..]);

    // The end shrinks by the length of the start marker.
    let range = TextRange::new(
        TextSize::from(start as u32),
        TextSize::from((end - start_marker.len()) as u32),
    );
    (text, range)
}

/// Like [`extract_range`], but a single `/*caret*/` marker yields an empty selection.
pub fn extract_selection(fixture: &str) -> (String, TextRange) {
    let caret = "/*caret*/";
    match fixture.find(caret) {
        Some(offset) => {
            let text = format!("{}{}", &fixture[..offset], &fixture[offset + caret.len()..]);
            (text, TextRange::empty(TextSize::from(offset as u32)))
        }
        None => extract_range(fixture),
    }
}

/// Range of the `nth` (0-based) occurrence of `needle` in `text`.
pub fn range_of(text: &str, needle: &str, nth: usize) -> TextRange {
    let (offset, _) = text
        .match_indices(needle)
        .nth(nth)
        .unwrap_or_else(|| panic!("`{needle}` occurs fewer than {} times", nth + 1));
    TextRange::at(TextSize::from(offset as u32), TextSize::of(needle))
}

/// Range of the `nth` (0-based) whole-word occurrence of the identifier `name` in `text`.
pub fn word_range(text: &str, name: &str, nth: usize) -> TextRange {
    let is_part = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let (offset, _) = text
        .match_indices(name)
        .filter(|(offset, _)| {
            let before = text[..*offset].chars().next_back();
            let after = text[offset + name.len()..].chars().next();
            !before.is_some_and(is_part) && !after.is_some_and(is_part)
        })
        .nth(nth)
        .unwrap_or_else(|| panic!("word `{name}` occurs fewer than {} times", nth + 1));
    TextRange::at(TextSize::from(offset as u32), TextSize::of(name))
}

/// Write `files` (`/`-separated relative paths) into a fresh temporary directory.
pub fn write_temp_workspace<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (rel, text) in files {
        let path = rel
            .split('/')
            .fold(dir.path().to_path_buf(), |path, segment| path.join(segment));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|err| panic!("failed to create {}: {err}", parent.display()));
        }
        fs::write(&path, text).unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
    }
    dir
}

/// A minimal multi-file fixture with `$0`, `$1`, ... markers.
///
/// Files start with a `//- path` header line. Marker IDs must be unique across the entire
/// fixture; duplicate IDs panic during parsing.
#[derive(Debug)]
pub struct Fixture {
    files: Vec<(FileId, String)>,
    markers: HashMap<u32, (FileId, TextSize)>,
}

impl Fixture {
    #[must_use]
    pub fn parse(fixture: &str) -> Self {
        let mut current_path: Option<String> = None;
        let mut current_text = String::new();
        let mut raw_files: Vec<(FileId, String)> = Vec::new();

        for line in fixture.lines() {
            if let Some(rest) = line.strip_prefix("//-") {
                if let Some(path) = current_path.take() {
                    raw_files.push((file_id_for_fixture_path(&path), std::mem::take(&mut current_text)));
                }
                current_path = Some(rest.trim().to_string());
                continue;
            }
            current_text.push_str(line);
            current_text.push('\n');
        }
        if let Some(path) = current_path.take() {
            raw_files.push((file_id_for_fixture_path(&path), current_text));
        }

        let mut markers: HashMap<u32, (FileId, TextSize)> = HashMap::new();
        let mut files = Vec::with_capacity(raw_files.len());
        for (file, text) in raw_files {
            let (text, file_markers) = strip_markers(&text);
            for (id, offset) in file_markers {
                let offset = TextSize::from(offset as u32);
                if let Some((prev_file, prev_offset)) = markers.insert(id, (file.clone(), offset)) {
                    panic!(
                        "duplicate fixture marker ${id} (first at {prev_file}:{prev_offset:?}, again at {file}:{offset:?})"
                    );
                }
            }
            files.push((file, text));
        }

        Self { files, markers }
    }

    /// `(file, text)` pairs, in fixture order.
    pub fn files(&self) -> &[(FileId, String)] {
        &self.files
    }

    pub fn into_files(self) -> Vec<(FileId, String)> {
        self.files
    }

    #[must_use]
    pub fn text(&self, file: &str) -> &str {
        self.files
            .iter()
            .find(|(id, _)| id.as_str() == file)
            .map(|(_, text)| text.as_str())
            .unwrap_or_else(|| panic!("fixture has no file `{file}`"))
    }

    #[must_use]
    pub fn marker(&self, id: u32) -> (FileId, TextSize) {
        self.markers
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("fixture has no marker ${id}"))
    }

    /// The selection between markers `start` and `end`, which must be in the same file.
    #[must_use]
    pub fn selection(&self, start: u32, end: u32) -> (FileId, TextRange) {
        let (file, from) = self.marker(start);
        let (end_file, to) = self.marker(end);
        assert_eq!(file, end_file, "markers ${start} and ${end} are in different files");
        (file, TextRange::new(from, to))
    }

    /// An empty selection at marker `id`.
    #[must_use]
    pub fn caret(&self, id: u32) -> (FileId, TextRange) {
        let (file, offset) = self.marker(id);
        (file, TextRange::empty(offset))
    }
}

fn file_id_for_fixture_path(path: &str) -> FileId {
    let path = path.trim().replace('\\', "/");
    FileId::new(path.trim_start_matches('/'))
}

fn strip_markers(text: &str) -> (String, Vec<(u32, usize)>) {
    let mut out = String::with_capacity(text.len());
    let mut markers = Vec::new();

    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut last = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }

            if j > i + 1 {
                // `$` and ASCII digits are single-byte, so `i` and `j` are char boundaries.
                out.push_str(&text[last..i]);
                let id: u32 = text[i + 1..j].parse().expect("marker id fits in u32");
                markers.push((id, out.len()));
                i = j;
                last = j;
                continue;
            }
        }

        i += 1;
    }

    out.push_str(&text[last..]);

    (out, markers)
}
