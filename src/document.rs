//! Loading bugreport text from disk.
//!
//! Plain files are decoded as UTF-8 with lossy replacement. `.zip` files are
//! treated as Android bugreport archives: the main report is the largest
//! `bugreport*.txt` entry, falling back to the largest `.txt` entry.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

/// Maximum decompressed bytes read from one ZIP entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 1024 * 1024 * 1024;

/// Document text plus the identifier recorded in its index.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File name of the input (no directory part).
    pub source_id: String,
    pub text: String,
}

impl LoadedDocument {
    /// Hex SHA-256 of the text, stored as the index's `sourceDigest`.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}

pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

    let text = if is_zip {
        extract_report_from_zip(&bytes)
            .with_context(|| format!("Failed to extract bugreport from {}", path.display()))?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    tracing::debug!(source = %source_id, bytes = text.len(), "document loaded");
    Ok(LoadedDocument { source_id, text })
}

/// Pick the main report entry of a bugreport archive and decode it.
fn extract_report_from_zip(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).context("not a valid zip archive")?;

    let mut best_report: Option<(usize, u64)> = None;
    let mut best_txt: Option<(usize, u64)> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let file_name = entry
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !file_name.ends_with(".txt") {
            continue;
        }
        let size = entry.size();
        let candidate = Some((i, size));
        if file_name.starts_with("bugreport") && best_report.map_or(true, |(_, s)| size > s) {
            best_report = candidate;
        }
        if best_txt.map_or(true, |(_, s)| size > s) {
            best_txt = candidate;
        }
    }

    let Some((index, _)) = best_report.or(best_txt) else {
        bail!("archive contains no .txt entry");
    };

    let entry = archive.by_index(index)?;
    let name = entry.name().to_string();
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .with_context(|| format!("Failed to read zip entry {}", name))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        bail!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name,
            MAX_ENTRY_BYTES
        );
    }
    tracing::debug!(entry = %name, bytes = out.len(), "selected bugreport entry");
    Ok(String::from_utf8_lossy(&out).into_owned())
}
