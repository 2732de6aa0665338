// SPDX-License-Identifier: MIT

//! SQLite-backed metadata store, keyed by filename

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::{Result, VisorError};

/// One catalogued image's metadata. `filename` is the unique key and matches
/// an actual file in the image directory at time of use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub filename: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub museum: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Record {
    /// Empty record for an image opened for the first time. Every field except
    /// the filename defaults to empty; nothing is validated at this layer.
    pub fn empty(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            ..Self::default()
        }
    }

    /// True once enough metadata is present to derive a canonical filename.
    pub fn has_metadata(&self) -> bool {
        !self.title.is_empty() && !self.author.is_empty()
    }
}

/// Catalog statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub record_count: i64,
    pub tag_count: i64,
    pub complete_count: i64,
}

/// Metadata store (thread-safe wrapper around a single connection)
#[derive(Clone)]
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VisorError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                museum TEXT NOT NULL DEFAULT '',
                material TEXT NOT NULL DEFAULT '',
                style TEXT NOT NULL DEFAULT '',
                dimensions TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS record_tags (
                record_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (record_id, tag_id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_filename ON records(filename);
        "#,
        )?;
        Ok(())
    }

    /// Fetch a record by filename
    pub fn get(&self, filename: &str) -> Result<Option<Record>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            r#"SELECT id, filename, title, author, year, description, museum, material, style, dimensions, source
               FROM records WHERE filename = ?1"#,
            params![filename],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Record {
                        filename: row.get(1)?,
                        title: row.get(2)?,
                        author: row.get(3)?,
                        year: row.get(4)?,
                        description: row.get(5)?,
                        museum: row.get(6)?,
                        material: row.get(7)?,
                        style: row.get(8)?,
                        dimensions: row.get(9)?,
                        source: row.get(10)?,
                        tags: Vec::new(),
                    },
                ))
            },
        );

        match result {
            Ok((id, mut record)) => {
                record.tags = Self::tags_for(&conn, id)?;
                Ok(Some(record))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or update a record, replacing its tag set
    pub fn upsert(&self, record: &Record) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO records (filename, title, author, year, description, museum, material, style, dimensions, source, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
               ON CONFLICT(filename) DO UPDATE SET
                   title = ?2, author = ?3, year = ?4, description = ?5, museum = ?6,
                   material = ?7, style = ?8, dimensions = ?9, source = ?10,
                   updated_at = datetime('now')"#,
            params![
                record.filename,
                record.title,
                record.author,
                record.year,
                record.description,
                record.museum,
                record.material,
                record.style,
                record.dimensions,
                record.source,
            ],
        )?;

        let record_id: i64 = tx.query_row(
            "SELECT id FROM records WHERE filename = ?1",
            params![record.filename],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM record_tags WHERE record_id = ?1", params![record_id])?;
        for tag in &record.tags {
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
            let tag_id: i64 =
                tx.query_row("SELECT id FROM tags WHERE name = ?1", params![tag], |row| row.get(0))?;
            tx.execute(
                "INSERT OR IGNORE INTO record_tags (record_id, tag_id) VALUES (?1, ?2)",
                params![record_id, tag_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Move a record to a new filename key. The caller renames the file on
    /// disk; this keeps the store side of the pair in sync.
    pub fn rename_record(&self, old: &str, new: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE records SET filename = ?2, updated_at = datetime('now') WHERE filename = ?1",
            params![old, new],
        )?;
        Ok(())
    }

    /// List all records, sorted by filename
    pub fn list(&self) -> Result<Vec<Record>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, filename, title, author, year, description, museum, material, style, dimensions, source
               FROM records ORDER BY filename"#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Record {
                        filename: row.get(1)?,
                        title: row.get(2)?,
                        author: row.get(3)?,
                        year: row.get(4)?,
                        description: row.get(5)?,
                        museum: row.get(6)?,
                        material: row.get(7)?,
                        style: row.get(8)?,
                        dimensions: row.get(9)?,
                        source: row.get(10)?,
                        tags: Vec::new(),
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, mut record) in rows {
            record.tags = Self::tags_for(&conn, id)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Filenames that have a record (used by the gallery's missing-only filter)
    pub fn filenames(&self) -> Result<HashSet<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT filename FROM records")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(names)
    }

    /// All tag names, sorted
    pub fn all_tags(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.lock_conn()?;
        let record_count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        let tag_count: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        let complete_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE title != '' AND author != ''",
            [],
            |row| row.get(0),
        )?;
        Ok(CatalogStats {
            record_count,
            tag_count,
            complete_count,
        })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }

    fn tags_for(conn: &Connection, record_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"SELECT t.name FROM tags t
               JOIN record_tags rt ON rt.tag_id = t.id
               WHERE rt.record_id = ?1 ORDER BY t.name"#,
        )?;
        let tags = stmt
            .query_map(params![record_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}
