// SPDX-License-Identifier: MIT

//! Image source: read-only enumeration of one directory plus the browsing
//! cursor the UI navigates with

use std::collections::HashSet;
use std::path::Path;

use crate::Result;

/// List image files in `dir`, filtered by extension (case-insensitive, no
/// dot), sorted by name. The listing is treated as immutable for a session;
/// a rename made through the catalog patches the cursor instead of rescanning.
pub fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if extensions.iter().any(|allowed| *allowed == ext) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Explicit session state: a cursor over the (lazily filtered) image list
#[derive(Debug, Clone)]
pub struct GalleryCursor {
    files: Vec<String>,
    index: usize,
    missing_only: bool,
}

impl GalleryCursor {
    pub fn new(files: Vec<String>) -> Self {
        Self {
            files,
            index: 0,
            missing_only: false,
        }
    }

    /// Toggle the "only images without metadata" filter. Resets the index so
    /// the cursor never points past the filtered list.
    pub fn set_missing_only(&mut self, missing_only: bool) {
        if self.missing_only != missing_only {
            self.missing_only = missing_only;
            self.index = 0;
        }
    }

    pub fn missing_only(&self) -> bool {
        self.missing_only
    }

    /// Files currently visible, given the set of filenames that have records
    pub fn visible<'a>(&'a self, catalogued: &HashSet<String>) -> Vec<&'a str> {
        if self.missing_only {
            self.files
                .iter()
                .filter(|f| !catalogued.contains(f.as_str()))
                .map(String::as_str)
                .collect()
        } else {
            self.files.iter().map(String::as_str).collect()
        }
    }

    /// Currently selected file, None when the visible list is empty
    pub fn current<'a>(&'a self, catalogued: &HashSet<String>) -> Option<&'a str> {
        let visible = self.visible(catalogued);
        if visible.is_empty() {
            return None;
        }
        Some(visible[self.index % visible.len()])
    }

    /// Advance with wrap-around
    pub fn next(&mut self, catalogued: &HashSet<String>) {
        let len = self.visible(catalogued).len();
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }

    /// Step back with wrap-around
    pub fn prev(&mut self, catalogued: &HashSet<String>) {
        let len = self.visible(catalogued).len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    /// Point the cursor at a specific file within the visible list. Returns
    /// false, leaving the index alone, when the file is not visible.
    pub fn select(&mut self, filename: &str, catalogued: &HashSet<String>) -> bool {
        let pos = self.visible(catalogued).iter().position(|f| *f == filename);
        match pos {
            Some(i) => {
                self.index = i;
                true
            }
            None => false,
        }
    }

    /// Patch the list after a rename so the cursor keeps pointing at the same
    /// image under its new name.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(slot) = self.files.iter_mut().find(|f| *f == old) {
            *slot = new.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn lists_only_image_extensions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", "c.JPEG", "d.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = list_images(dir.path(), &exts()).unwrap();
        assert_eq!(files, vec!["a.jpg", "b.png", "c.JPEG"]);
    }

    #[test]
    fn skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("album.jpg")).unwrap();
        std::fs::write(dir.path().join("real.jpg"), b"x").unwrap();

        let files = list_images(dir.path(), &exts()).unwrap();
        assert_eq!(files, vec!["real.jpg"]);
    }

    #[test]
    fn cursor_wraps_both_directions() {
        let mut cursor = GalleryCursor::new(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]);
        let none = HashSet::new();

        assert_eq!(cursor.current(&none), Some("a.jpg"));
        cursor.prev(&none);
        assert_eq!(cursor.current(&none), Some("c.jpg"));
        cursor.next(&none);
        cursor.next(&none);
        assert_eq!(cursor.current(&none), Some("b.jpg"));
    }

    #[test]
    fn missing_filter_hides_catalogued_files() {
        let mut cursor = GalleryCursor::new(vec!["a.jpg".into(), "b.jpg".into()]);
        let catalogued: HashSet<String> = ["a.jpg".to_string()].into_iter().collect();

        cursor.set_missing_only(true);
        assert_eq!(cursor.visible(&catalogued), vec!["b.jpg"]);
        assert_eq!(cursor.current(&catalogued), Some("b.jpg"));
    }

    #[test]
    fn empty_visible_list_yields_none() {
        let mut cursor = GalleryCursor::new(vec!["a.jpg".into()]);
        let catalogued: HashSet<String> = ["a.jpg".to_string()].into_iter().collect();

        cursor.set_missing_only(true);
        assert_eq!(cursor.current(&catalogued), None);
        // Navigation on an empty view must not panic
        cursor.next(&catalogued);
        cursor.prev(&catalogued);
    }

    #[test]
    fn select_positions_cursor_on_named_file() {
        let mut cursor = GalleryCursor::new(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]);
        let none = HashSet::new();

        assert!(cursor.select("b.jpg", &none));
        assert_eq!(cursor.current(&none), Some("b.jpg"));
        cursor.next(&none);
        assert_eq!(cursor.current(&none), Some("c.jpg"));

        assert!(!cursor.select("zzz.jpg", &none));
        assert_eq!(cursor.current(&none), Some("c.jpg"));
    }

    #[test]
    fn rename_patches_list_in_place() {
        let mut cursor = GalleryCursor::new(vec!["a.jpg".into(), "b.jpg".into()]);
        cursor.rename("b.jpg", "Doe, Jane - Portrait.jpg");

        let none = HashSet::new();
        assert_eq!(cursor.visible(&none), vec!["a.jpg", "Doe, Jane - Portrait.jpg"]);
    }
}
