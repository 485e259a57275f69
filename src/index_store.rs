//! Filesystem persistence for [`Index`] records.
//!
//! One JSON file per build, named
//! `<sanitized source>-<YYYYMMDD-HHMMSS>-index.json`. Files are never
//! updated in place: re-indexing writes a new file.
//!
//! Loading is forgiving. Unknown fields are ignored, and a file that cannot
//! be parsed is logged and treated as absent so the caller can rebuild.

use std::fs::DirEntry;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use bugreport_harness_core::models::Index;

/// File-name suffix shared by every saved index.
pub const INDEX_SUFFIX: &str = "-index.json";

const PLACEHOLDER_NAME: &str = "bugreport";

/// A saved index file found by [`list`].
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Filesystem-safe base name for `source_id`.
///
/// Drops any directory part, strips `.zip` / `.txt` suffixes
/// (case-insensitive), replaces characters outside `[A-Za-z0-9._-]` with
/// `_`, and falls back to `bugreport` when nothing is left.
pub fn sanitize_source_id(source_id: &str) -> String {
    let base = source_id
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_id)
        .trim();

    let mut stem = base;
    loop {
        let lower = stem.to_ascii_lowercase();
        if lower.ends_with(".zip") || lower.ends_with(".txt") {
            stem = &stem[..stem.len() - 4];
        } else {
            break;
        }
    }

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned
    }
}

/// File name `save` uses for `index`.
pub fn file_name_for(index: &Index) -> String {
    format!(
        "{}-{}{}",
        sanitize_source_id(&index.source_id),
        index.created_at.format("%Y%m%d-%H%M%S"),
        INDEX_SUFFIX
    )
}

/// Write `index` into `dir`, creating the directory if needed. An existing
/// file with the same name is overwritten.
pub fn save(index: &Index, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

    let path = dir.join(file_name_for(index));
    let json = serde_json::to_string(index).context("Failed to serialize index")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write index file: {}", path.display()))?;

    tracing::info!(path = %path.display(), chunks = index.chunks.len(), "index saved");
    Ok(path)
}

/// Read an index file. Returns `None` when the file is missing or corrupt.
pub fn load(path: &Path) -> Option<Index> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read index file");
            return None;
        }
    };
    match serde_json::from_str::<Index>(&content) {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "index file is corrupt; rebuild needed");
            None
        }
    }
}

/// Saved index files in `dir`, newest modification time first. A missing
/// directory yields an empty list.
pub fn list(dir: &Path) -> Result<Vec<IndexEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read index directory: {}", dir.display()))
        }
    };

    let mut found: Vec<IndexEntry> = entries
        .filter_map(|entry| index_entry(dir, entry))
        .collect();

    // Newest first; the file name (which embeds createdAt) breaks ties.
    found.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    Ok(found)
}

/// Describe one directory entry if it is a readable index file. Entries that
/// vanish or cannot be inspected are logged and skipped.
fn index_entry(dir: &Path, entry: std::io::Result<DirEntry>) -> Option<IndexEntry> {
    let path = match entry {
        Ok(entry) => entry.path(),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
            return None;
        }
    };
    let is_index = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(INDEX_SUFFIX));
    if !is_index {
        return None;
    }
    // Follows symlinks, so a dangling link fails here rather than in `load`.
    let meta = match std::fs::metadata(&path) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable index entry");
            return None;
        }
    };
    if !meta.is_file() {
        return None;
    }
    Some(IndexEntry {
        path,
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}

/// Load the most recently modified index in `dir`.
pub fn load_latest(dir: &Path) -> Result<Option<Index>> {
    Ok(list(dir)?.first().and_then(|entry| load(&entry.path)))
}
