//! Multi-stage (map-reduce) summarization.
//!
//! The document is partitioned by line into segments of at most
//! `chunk_limit` characters, capped at `max_chunks` segments by merging the tail
//! into the last one. Each segment is summarized independently, then the
//! partial summaries are merged into one.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{CoreError, Result};

/// The two model calls of a summarization run.
#[async_trait]
pub trait SegmentSummarizer: Send + Sync {
    /// Summarize segment `index` (0-based) of `total`.
    async fn summarize(&self, segment: &str, index: usize, total: usize) -> Result<String>;

    /// Merge per-segment summaries, in segment order, into one.
    async fn merge(&self, summaries: &[String]) -> Result<String>;
}

/// Split `document` into line-aligned segments of at most `chunk_limit`
/// characters (not bytes).
///
/// Blank lines are kept, so joining the result with `"\n"` reproduces the
/// document's lines. A line longer than `chunk_limit` gets a segment of its
/// own. When more than `max_chunks` segments result, segments `max_chunks`
/// onward (1-based) are joined with `"\n"` into the last kept segment.
pub fn partition_lines(document: &str, chunk_limit: usize, max_chunks: usize) -> Vec<String> {
    if document.trim().is_empty() {
        return Vec::new();
    }
    let chunk_limit = chunk_limit.max(1);
    let max_chunks = max_chunks.max(1);

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    // A segment holding only a blank line is still open.
    let mut started = false;
    for line in document.lines() {
        let line_chars = line.chars().count();
        if started && current_chars + 1 + line_chars > chunk_limit {
            segments.push(std::mem::take(&mut current));
            current_chars = 0;
            started = false;
        }
        if started {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
        started = true;
    }
    if started {
        segments.push(current);
    }

    if segments.len() > max_chunks {
        let tail = segments.split_off(max_chunks - 1).join("\n");
        segments.push(tail);
    }
    segments
}

/// Summarize `document` segment by segment and merge the results.
///
/// Returns `Ok(None)` when there is nothing to summarize or every segment
/// failed. Segment failures are passed to `on_error` in segment order and
/// excluded from the merge. At most `concurrency` segment calls are in
/// flight at once.
///
/// # Errors
///
/// Only a failing [`SegmentSummarizer::merge`] call is returned as an error.
pub async fn summarize<S, F>(
    document: &str,
    chunk_limit: usize,
    max_chunks: usize,
    concurrency: usize,
    summarizer: &S,
    mut on_error: F,
) -> Result<Option<String>>
where
    S: SegmentSummarizer + ?Sized,
    F: FnMut(usize, &CoreError),
{
    let segments = partition_lines(document, chunk_limit, max_chunks);
    let total = segments.len();
    if total == 0 {
        return Ok(None);
    }

    let results: Vec<(usize, Result<String>)> = stream::iter(segments.iter().enumerate())
        .map(|(i, segment)| async move { (i, summarizer.summarize(segment, i, total).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut summaries = Vec::with_capacity(total);
    for (i, result) in results {
        match result {
            Ok(summary) if !summary.trim().is_empty() => summaries.push(summary),
            Ok(_) => {}
            Err(e) => on_error(i, &e),
        }
    }

    if summaries.is_empty() {
        return Ok(None);
    }
    if total == 1 {
        return Ok(summaries.pop());
    }
    summarizer.merge(&summaries).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        inputs: Mutex<Vec<String>>,
        merges: Mutex<Vec<Vec<String>>>,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl SegmentSummarizer for Recorder {
        async fn summarize(&self, segment: &str, index: usize, _total: usize) -> Result<String> {
            self.inputs.lock().unwrap().push(segment.to_string());
            if self.fail_on.contains(&index) {
                return Err(CoreError::ProviderUnavailable(format!("segment {}", index)));
            }
            Ok(format!("summary {}", index))
        }

        async fn merge(&self, summaries: &[String]) -> Result<String> {
            self.merges.lock().unwrap().push(summaries.to_vec());
            Ok(summaries.join(" + "))
        }
    }

    fn seven_lines() -> String {
        (1..=7).map(|i| format!("line{}", i)).collect::<Vec<_>>().join("\n")
    }

    #[tokio::test]
    async fn empty_document_is_none() {
        let rec = Recorder::default();
        let out = summarize("", 100, 5, 1, &rec, |_, _| {}).await.unwrap();
        assert!(out.is_none());
        let out = summarize("  \n\n ", 100, 5, 1, &rec, |_, _| {}).await.unwrap();
        assert!(out.is_none());
        assert!(rec.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_segment_skips_merge() {
        let rec = Recorder::default();
        let out = summarize("one short line", 1000, 5, 1, &rec, |_, _| {})
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("summary 0"));
        assert_eq!(rec.inputs.lock().unwrap().len(), 1);
        assert!(rec.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tail_is_merged_into_last_segment() {
        let rec = Recorder::default();
        let out = summarize(&seven_lines(), 5, 5, 2, &rec, |_, _| {})
            .await
            .unwrap();
        let inputs = rec.inputs.lock().unwrap().clone();
        assert_eq!(inputs.len(), 5);
        assert_eq!(inputs[4], "line5\nline6\nline7");
        assert_eq!(
            out.as_deref(),
            Some("summary 0 + summary 1 + summary 2 + summary 3 + summary 4")
        );
    }

    #[tokio::test]
    async fn failures_are_reported_in_order_and_excluded() {
        let rec = Recorder {
            fail_on: vec![1, 3],
            ..Default::default()
        };
        let mut failed = Vec::new();
        let out = summarize(&seven_lines(), 5, 5, 3, &rec, |i, _| failed.push(i))
            .await
            .unwrap();
        assert_eq!(failed, vec![1, 3]);
        assert_eq!(out.as_deref(), Some("summary 0 + summary 2 + summary 4"));
    }

    #[tokio::test]
    async fn all_failed_is_none() {
        let rec = Recorder {
            fail_on: vec![0, 1],
            ..Default::default()
        };
        let out = summarize("aaaa\nbbbb", 4, 5, 1, &rec, |_, _| {})
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(rec.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_success_among_several_still_merges() {
        let rec = Recorder {
            fail_on: vec![0],
            ..Default::default()
        };
        let out = summarize("aaaa\nbbbb", 4, 5, 1, &rec, |_, _| {})
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("summary 1"));
        assert_eq!(rec.merges.lock().unwrap().len(), 1);
    }

    #[test]
    fn partition_respects_limit_and_keeps_long_lines_whole() {
        let doc = format!("ab\ncd\n{}\nef", "x".repeat(20));
        let segments = partition_lines(&doc, 5, 10);
        assert_eq!(segments, vec!["ab\ncd".to_string(), "x".repeat(20), "ef".to_string()]);
    }

    #[test]
    fn zero_limits_are_floored() {
        let segments = partition_lines("a\nb\nc", 0, 0);
        assert_eq!(segments, vec!["a\nb\nc".to_string()]);
    }

    #[test]
    fn partition_keeps_blank_line_after_flush() {
        let segments = partition_lines("a\n\nb", 1, 10);
        assert_eq!(segments, vec!["a".to_string(), String::new(), "b".to_string()]);
        assert_eq!(segments.join("\n"), "a\n\nb");
    }

    #[test]
    fn partition_keeps_leading_blank_line() {
        assert_eq!(partition_lines("\nx", 100, 10), vec!["\nx".to_string()]);
    }

    #[test]
    fn partition_preserves_lines_across_limits() {
        let doc = "------ SYSTEM LOG ------\n\nline one\n\n\nline two\nend";
        for limit in [1, 3, 8, 12, 40] {
            let segments = partition_lines(doc, limit, 100);
            assert_eq!(segments.join("\n"), doc, "limit {}", limit);
        }
    }

    #[test]
    fn partition_limit_counts_characters() {
        // 7 characters but 13 bytes.
        let segments = partition_lines("ééé\nééé", 7, 10);
        assert_eq!(segments, vec!["ééé\nééé".to_string()]);
        let segments = partition_lines("ééé\nééé", 6, 10);
        assert_eq!(segments.len(), 2);
    }
}
