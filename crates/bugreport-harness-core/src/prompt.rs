//! Grounded prompt construction.
//!
//! Renders retrieved chunks plus citation rules into one prompt string.
//! Citations refer to the 1-based position of a chunk in the supplied list,
//! never to its persisted id. Pure string building, deterministic for
//! identical inputs.

use crate::completion::Message;
use crate::models::ScoredChunk;

/// System message sent ahead of every grounded prompt.
pub const SYSTEM_PROMPT: &str = "You are a diagnostics assistant answering questions about an Android \
bugreport. Answer only from the numbered sources in the user message and cite them exactly as instructed.";

/// Build the grounded prompt for `question` over `chunks`.
///
/// `source_id` is the Index's source identifier; it is printed with every
/// source so the model can name the document it is quoting.
pub fn build_prompt(question: &str, source_id: &str, chunks: &[ScoredChunk]) -> String {
    let range = citation_range(chunks.len());
    let mut prompt = String::new();

    prompt.push_str("Instructions:\n");
    prompt.push_str("1. Use only facts stated in the sources below. Do not rely on outside knowledge.\n");
    prompt.push_str(
        "2. Every factual claim must end with a bracketed citation giving the source number, e.g. [1].\n",
    );
    prompt.push_str(
        "3. A claim supported by several sources cites them in one bracket, comma-separated, e.g. [1, 3].\n",
    );
    if chunks.is_empty() {
        prompt.push_str("4. No sources were supplied, so no citation numbers are valid.\n");
    } else {
        prompt.push_str(&format!(
            "4. Only cite numbers from {}. Never invent a citation number outside that range.\n",
            range
        ));
    }
    prompt.push_str(&format!(
        "5. If the sources do not answer the question, say so explicitly and state that sources {} were considered.\n",
        range
    ));

    prompt.push_str("\nSources:\n");
    if chunks.is_empty() {
        prompt.push_str("(none)\n");
    }
    for (i, scored) in chunks.iter().enumerate() {
        let chunk = &scored.chunk;
        let fence = fence_for(&chunk.text);
        prompt.push_str(&format!(
            "\n[{}] source: {} | offsets: {}-{} | score: {:.4}\n{}\n{}\n{}\n",
            i + 1,
            source_id,
            chunk.start_offset,
            chunk.end_offset,
            scored.score,
            fence,
            chunk.text,
            fence
        ));
    }

    prompt.push_str("\nQuestion:\n");
    prompt.push_str(question);
    prompt.push('\n');
    prompt
}

/// Wrap [`build_prompt`] in the `[system, user]` pair sent to the
/// completion provider.
pub fn answer_messages(question: &str, source_id: &str, chunks: &[ScoredChunk]) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(build_prompt(question, source_id, chunks)),
    ]
}

fn citation_range(n: usize) -> String {
    match n {
        0 => "(none; the source list is empty)".to_string(),
        1 => "[1]".to_string(),
        n => format!("[1] to [{}]", n),
    }
}

/// A backtick fence longer than any backtick run inside `text` (min 3).
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
