//! Overlapping window chunker with boundary snapping.
//!
//! Splits a document into fixed-size, overlapping [`Chunk`]s. Each window
//! end is pulled to the nearest natural boundary (a paragraph break or a
//! horizontal rule) within [`BOUNDARY_RADIUS`] bytes, so a window rarely
//! cuts a bugreport section or log paragraph in half.
//!
//! # Algorithm
//!
//! 1. `step = max(1, chunk_size - overlap)`, so the loop always advances.
//! 2. Starting at offset 0, propose `end = start + chunk_size` (clamped to
//!    the document length).
//! 3. Look for boundaries in `[end - 200, end + 200]`:
//!    - a paragraph break `"\n\n"` marks the offset just after it;
//!    - a line opening with three or more `-` (a horizontal rule such as a
//!      bugreport `------ SYSTEM LOG ------` header) marks the line start.
//! 4. Boundaries before `start + step` are ignored, so a window never ends
//!    before the next one begins. Of the rest, the nearest becomes the window
//!    end (ties prefer the later boundary).
//! 5. Emit `[start, end)` with the next sequential id, then advance `start`
//!    by `step` (not to `end`), so windows keep their overlap and together
//!    cover every byte of the document.
//! 6. Stop once `start` reaches the document length.
//!
//! Identical input always yields an identical chunk sequence.
//!
//! # Example
//!
//! ```rust
//! use bugreport_harness_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("AAAA\n\nBBBB\n\nCCCC", 6, 2);
//! assert_eq!(chunks[0].start_offset, 0);
//! assert_eq!(chunks[1].text, "\n\nBBBB\n\n");
//! ```

use crate::models::Chunk;

/// How far (in bytes) around the proposed window end to look for a boundary.
pub const BOUNDARY_RADIUS: usize = 200;

/// Minimum number of consecutive dashes treated as a horizontal rule.
const RULE_MIN_DASHES: usize = 3;

/// Split `text` into overlapping windows of roughly `chunk_size` bytes.
///
/// Returns an empty vector for empty text. `chunk_size == 0` is treated as
/// 1; an `overlap` of `chunk_size` or more degrades to a step of one byte.
///
/// # Guarantees
///
/// - Ids are contiguous: `0, 1, 2, …, N-1`.
/// - `chunks[0].start_offset == 0` and start offsets strictly increase.
/// - `start_offset < end_offset <= text.len()` for every chunk, and
///   `chunk.text == text[start_offset..end_offset]`.
/// - Each chunk starts no later than the previous one ends, and the last
///   chunk ends at `text.len()`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);
    let len = text.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut next_id: u64 = 0;

    while start < len {
        let next_start = snap_forward(text, start + step);
        let proposed = window_end(text, start, start.saturating_add(chunk_size));
        let end = nearest_boundary(text, next_start, proposed).unwrap_or(proposed.max(next_start));

        chunks.push(Chunk {
            id: next_id,
            start_offset: start,
            end_offset: end,
            text: text[start..end].to_string(),
        });
        next_id += 1;

        start = next_start;
    }

    chunks
}

/// Clamp a proposed window end to the document and to a char boundary,
/// never producing an empty window.
fn window_end(text: &str, start: usize, proposed: usize) -> usize {
    let end = snap_to_char_boundary(text, proposed.min(text.len()));
    if end > start {
        end
    } else {
        snap_forward(text, start + 1)
    }
}

/// Find the boundary nearest to `target` within [`BOUNDARY_RADIUS`] that
/// lies at or after `min_end`.
fn nearest_boundary(text: &str, min_end: usize, target: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let lo = target.saturating_sub(BOUNDARY_RADIUS);
    let hi = target.saturating_add(BOUNDARY_RADIUS).min(len);

    let mut best: Option<usize> = None;
    // A paragraph break starting two bytes before `lo` still ends inside it.
    for i in lo.saturating_sub(2)..hi {
        if bytes[i] == b'\n' && i + 1 < len && bytes[i + 1] == b'\n' {
            best = closer(best, i + 2, min_end, lo, hi, target);
        }
        if bytes[i] == b'-' && (i == 0 || bytes[i - 1] == b'\n') && is_rule_at(bytes, i) {
            best = closer(best, i, min_end, lo, hi, target);
        }
    }
    best
}

fn is_rule_at(bytes: &[u8], i: usize) -> bool {
    i + RULE_MIN_DASHES <= bytes.len() && bytes[i..i + RULE_MIN_DASHES].iter().all(|&b| b == b'-')
}

/// Keep whichever of `best` and `pos` is closer to `target`.
fn closer(
    best: Option<usize>,
    pos: usize,
    min_end: usize,
    lo: usize,
    hi: usize,
    target: usize,
) -> Option<usize> {
    if pos < min_end || pos < lo || pos > hi {
        return best;
    }
    match best {
        None => Some(pos),
        Some(b) => {
            let (d_pos, d_best) = (pos.abs_diff(target), b.abs_diff(target));
            if d_pos < d_best || (d_pos == d_best && pos > b) {
                Some(pos)
            } else {
                Some(b)
            }
        }
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the next valid UTF-8 char boundary.
fn snap_forward(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
