// SPDX-License-Identifier: MIT

//! Canonical filename derivation and collision-safe renaming
//!
//! A record with non-empty title and author gets the filename
//! "Surname, Given - Title (Year)". Characters outside the whitelist are
//! dropped, collisions are resolved with a "(n)" suffix, and a rename updates
//! both the file on disk and the store key.

use std::path::Path;
use tracing::{debug, info};

use crate::db::{Catalog, Record};
use crate::{Result, VisorError};

/// Outcome of a save against the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Derived name already matched, or the record is not ready for renaming
    Unchanged,
    /// File moved and store key updated
    Renamed { from: String, to: String },
}

/// Split an author string into (surname, given name) on the first space.
/// "Vincent van Gogh" -> ("van Gogh", "Vincent"); a single token is treated
/// as the surname with an empty given name.
pub fn split_author(author: &str) -> (String, String) {
    let trimmed = author.trim();
    match trimmed.split_once(' ') {
        Some((given, surname)) => (surname.to_string(), given.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Drop every character outside [A-Za-z0-9 -_.,()], then trim trailing
/// whitespace. Leading whitespace and internal runs of spaces survive.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | ',' | '(' | ')'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Extension of a filename including the leading dot ("" when there is none)
pub fn extension_of(filename: &str) -> &str {
    filename.rfind('.').map(|i| &filename[i..]).unwrap_or("")
}

/// Canonical base name (no extension) for a record, None while title or
/// author is still empty and the record is not ready for renaming.
///
/// When the given name is empty the ", " separator is still emitted, so
/// single-name authors produce "Prince,  - Title". Known quirk, kept because
/// existing catalogs already carry names in that form.
pub fn canonical_base_name(record: &Record) -> Option<String> {
    if !record.has_metadata() {
        return None;
    }

    let (surname, given) = split_author(&record.author);
    let mut base = format!("{}, {} - {}", surname, given, record.title);
    if !record.year.is_empty() {
        base.push_str(&format!(" ({})", record.year));
    }
    Some(sanitize(&base))
}

/// Derive the canonical base name, handing the record's current filename
/// back unchanged when it is not ready to rename.
pub fn derive_base_name(record: &Record) -> String {
    canonical_base_name(record).unwrap_or_else(|| record.filename.clone())
}

/// Find a free filename for `base + ext` in `dir`, probing with a "(n)"
/// suffix. The record's current name never counts as a collision, so saving
/// a record onto itself is a no-op rather than a renumbering.
pub fn resolve_unique_name(base: &str, ext: &str, dir: &Path, current: &str) -> String {
    let mut candidate = format!("{}{}", base, ext);
    if candidate == current {
        return candidate;
    }

    // Linear, unbounded probe; runs once per save against a directory of at
    // most a few thousand entries.
    let mut counter = 1u32;
    while candidate != current && dir.join(&candidate).exists() {
        candidate = format!("{} ({}){}", base, counter, ext);
        counter += 1;
    }
    candidate
}

/// Move `dir/current` to `dir/new`. A missing source file means the store and
/// the filesystem have drifted apart; that is surfaced, never swallowed.
pub fn apply_rename(dir: &Path, current: &str, new: &str) -> Result<RenameOutcome> {
    if new == current {
        return Ok(RenameOutcome::Unchanged);
    }

    let src = dir.join(current);
    if !src.exists() {
        return Err(VisorError::MissingSourceFile(src));
    }

    std::fs::rename(&src, dir.join(new))?;
    Ok(RenameOutcome::Renamed {
        from: current.to_string(),
        to: new.to_string(),
    })
}

/// Save a record, renaming its file to the canonical form when possible.
///
/// The file is moved first; only then is the store key updated and the record
/// upserted, so a `MissingSourceFile` failure leaves the store untouched.
/// Returns the outcome plus the record as stored (with its final filename).
pub fn commit_rename(db: &Catalog, images_dir: &Path, mut record: Record) -> Result<(RenameOutcome, Record)> {
    let Some(base) = canonical_base_name(&record) else {
        debug!("No canonical name for {:?}, saving in place", record.filename);
        db.upsert(&record)?;
        return Ok((RenameOutcome::Unchanged, record));
    };

    let current = record.filename.clone();
    let ext = extension_of(&current);
    let new_name = resolve_unique_name(&base, ext, images_dir, &current);

    let outcome = apply_rename(images_dir, &current, &new_name)?;
    if let RenameOutcome::Renamed { ref from, ref to } = outcome {
        info!("Renamed {:?} -> {:?}", from, to);
        db.rename_record(from, to)?;
        record.filename = to.clone();
    }

    db.upsert(&record)?;
    Ok((outcome, record))
}
