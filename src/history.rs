// SPDX-License-Identifier: MIT

//! Append-only rename history with undo support
//!
//! Undoing a rename moves the file back and restores the store key, so the
//! two never drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::db::Catalog;
use crate::naming::RenameOutcome;
use crate::Result;

/// A single rename operation in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub directory: PathBuf,
    pub old_name: String,
    pub new_name: String,
    pub title: String,
    pub author: String,
    pub undone: bool,
}

/// Outcome of undoing one history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// File moved back and store key restored
    Restored,
    /// The renamed file is no longer on disk, nothing to move back
    SourceMissing,
    /// The original name is occupied again; skipped so the newer file
    /// is not clobbered
    DestinationOccupied,
}

/// History manager backed by a JSONL file
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Record a committed rename. `Unchanged` outcomes are not logged.
    pub fn record(
        &self,
        directory: &Path,
        outcome: &RenameOutcome,
        title: &str,
        author: &str,
    ) -> Result<()> {
        let RenameOutcome::Renamed { from, to } = outcome else {
            return Ok(());
        };

        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            directory: directory.to_path_buf(),
            old_name: from.clone(),
            new_name: to.clone(),
            title: title.to_string(),
            author: author.to_string(),
            undone: false,
        };
        self.append(&entry)
    }

    /// Append an entry to the history
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all history entries
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Get entries that haven't been undone
    pub fn get_undoable(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Mark an entry as undone
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let entries = self.read_all()?;

        // Rewrite the entire file with the updated entry
        let file = File::create(&self.path)?;
        let mut writer = std::io::BufWriter::new(file);

        for mut entry in entries {
            if entry.id == id {
                entry.undone = true;
            }
            let json = serde_json::to_string(&entry)?;
            writeln!(writer, "{}", json)?;
        }

        Ok(())
    }

    /// Undo one recorded rename: move the file back to its old name and
    /// restore the store key, so the two never drift apart. The entry is
    /// marked undone only after both succeed; a missing source or an
    /// occupied original name skips the entry untouched.
    pub fn undo(&self, db: &Catalog, entry: &HistoryEntry) -> Result<UndoOutcome> {
        let current = entry.directory.join(&entry.new_name);
        if !current.exists() {
            return Ok(UndoOutcome::SourceMissing);
        }

        let original = entry.directory.join(&entry.old_name);
        if original.exists() {
            return Ok(UndoOutcome::DestinationOccupied);
        }

        fs::rename(&current, &original)?;
        db.rename_record(&entry.new_name, &entry.old_name)?;
        self.mark_undone(&entry.id)?;
        Ok(UndoOutcome::Restored)
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, old: &str, new: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            timestamp: Utc::now(),
            directory: PathBuf::from("/tmp/images"),
            old_name: old.to_string(),
            new_name: new.to_string(),
            title: "Portrait".to_string(),
            author: "Jane Doe".to_string(),
            undone: false,
        }
    }

    #[test]
    fn append_and_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        history.append(&entry("1", "a.jpg", "b.jpg")).unwrap();
        history.append(&entry("2", "c.jpg", "d.jpg")).unwrap();

        let entries = history.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].old_name, "a.jpg");
    }

    #[test]
    fn recent_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        history.append(&entry("1", "a.jpg", "b.jpg")).unwrap();
        history.append(&entry("2", "c.jpg", "d.jpg")).unwrap();

        let recent = history.get_recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "2");
    }

    #[test]
    fn mark_undone_excludes_from_undoable() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        history.append(&entry("1", "a.jpg", "b.jpg")).unwrap();
        history.append(&entry("2", "c.jpg", "d.jpg")).unwrap();

        history.mark_undone("1").unwrap();

        let undoable = history.get_undoable().unwrap();
        assert_eq!(undoable.len(), 1);
        assert_eq!(undoable[0].id, "2");
    }

    #[test]
    fn record_skips_unchanged_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        history
            .record(Path::new("/tmp"), &RenameOutcome::Unchanged, "T", "A")
            .unwrap();
        assert!(history.read_all().unwrap().is_empty());

        let outcome = RenameOutcome::Renamed {
            from: "a.jpg".to_string(),
            to: "b.jpg".to_string(),
        };
        history.record(Path::new("/tmp"), &outcome, "T", "A").unwrap();
        assert_eq!(history.read_all().unwrap().len(), 1);
    }

    #[test]
    fn undo_restores_file_and_store_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::Catalog::in_memory().unwrap();
        std::fs::write(dir.path().join("IMG_001.jpg"), b"img").unwrap();
        db.upsert(&crate::db::Record::empty("IMG_001.jpg")).unwrap();

        let record = crate::db::Record {
            filename: "IMG_001.jpg".to_string(),
            title: "Portrait".to_string(),
            author: "Jane Doe".to_string(),
            ..crate::db::Record::default()
        };
        let (outcome, saved) = crate::naming::commit_rename(&db, dir.path(), record).unwrap();
        assert_eq!(saved.filename, "Doe, Jane - Portrait.jpg");

        let history = History::new(dir.path().join("history.jsonl"));
        history.record(dir.path(), &outcome, &saved.title, &saved.author).unwrap();

        let entry = history.get_undoable().unwrap().pop().unwrap();
        assert_eq!(history.undo(&db, &entry).unwrap(), UndoOutcome::Restored);

        assert!(dir.path().join("IMG_001.jpg").exists());
        assert!(!dir.path().join("Doe, Jane - Portrait.jpg").exists());
        assert!(db.get("Doe, Jane - Portrait.jpg").unwrap().is_none());
        assert_eq!(db.get("IMG_001.jpg").unwrap().unwrap().title, "Portrait");
        assert!(history.get_undoable().unwrap().is_empty());
    }

    #[test]
    fn undo_skips_when_original_name_reoccupied() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::Catalog::in_memory().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"renamed").unwrap();
        db.upsert(&crate::db::Record::empty("b.jpg")).unwrap();
        // A fresh file has since taken the old name
        std::fs::write(dir.path().join("a.jpg"), b"newer file").unwrap();

        let history = History::new(dir.path().join("history.jsonl"));
        let entry = entry("1", "a.jpg", "b.jpg");
        let entry = HistoryEntry {
            directory: dir.path().to_path_buf(),
            ..entry
        };
        history.append(&entry).unwrap();

        assert_eq!(history.undo(&db, &entry).unwrap(), UndoOutcome::DestinationOccupied);

        // Nothing was clobbered and nothing was marked undone
        assert_eq!(std::fs::read(dir.path().join("a.jpg")).unwrap(), b"newer file");
        assert!(dir.path().join("b.jpg").exists());
        assert!(db.get("b.jpg").unwrap().is_some());
        assert_eq!(history.get_undoable().unwrap().len(), 1);
    }

    #[test]
    fn undo_reports_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::Catalog::in_memory().unwrap();

        let history = History::new(dir.path().join("history.jsonl"));
        let entry = HistoryEntry {
            directory: dir.path().to_path_buf(),
            ..entry("1", "a.jpg", "gone.jpg")
        };
        history.append(&entry).unwrap();

        assert_eq!(history.undo(&db, &entry).unwrap(), UndoOutcome::SourceMissing);
        assert_eq!(history.get_undoable().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("absent.jsonl"));
        assert!(history.read_all().unwrap().is_empty());
    }
}
