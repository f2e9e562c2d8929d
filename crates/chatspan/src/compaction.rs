//! Tiered transcript compaction.
//!
//! Runs inline after every append. Once estimated usage crosses the 85%
//! watermark, up to three strategies apply in strict order, each re-checking
//! the watermark before the next:
//!
//! 1. **Truncate long tool results** — tool output is the single largest
//!    context consumer in any agent loop; most of it is irrelevant after the
//!    model has processed it. Non-pinned tool messages over 500 chars are cut
//!    to 300 chars plus a marker. Idempotent.
//! 2. **Summarize old rounds** — with more than 6 rounds, everything but the
//!    last 5 is condensed into one summary-log entry and removed from the
//!    transcript (pinned messages survive the removal; the pin set resets
//!    afterward because positions no longer line up).
//! 3. **Scrub intermediate tool results** — newest to oldest, tool content
//!    outside the last 4 messages is replaced wholesale with a placeholder,
//!    stopping as soon as the watermark is satisfied. No pin exemption.
//!
//! Compaction never touches the system prompt or the summary log, and never
//! calls an LLM — it is local, synchronous, and deterministic.

use std::collections::HashSet;

use tracing::debug;

use crate::manager::ContextManager;
use crate::{Message, MessageRole};

/// Fraction of the ceiling at which compaction starts.
pub const COMPACTION_WATERMARK: f64 = 0.85;

/// Tool results longer than this (chars) are candidates for truncation.
pub const TOOL_RESULT_TRUNCATE_OVER: usize = 500;

/// How many chars of a truncated tool result survive.
pub const TOOL_RESULT_TRUNCATE_KEEP: usize = 300;

/// Marker appended to truncated tool results.
pub const TRUNCATED_MARKER: &str = "\n...[content truncated]";

/// Round count above which old rounds are summarized away.
const MAX_ROUNDS_BEFORE_SUMMARY: usize = 6;

/// How many of the most recent rounds survive round summarization.
const ROUNDS_TO_KEEP: usize = 5;

/// Placeholder written over scrubbed tool results.
pub const CLEARED_PLACEHOLDER: &str = "[result cleared]";

/// The last N transcript messages are exempt from scrubbing.
const SCRUB_PROTECTED_TAIL: usize = 4;

/// Chars of a message that make it into a summary line.
const SUMMARY_LINE_CHARS: usize = 100;

/// Prefix of every summary-log entry.
const HISTORY_SUMMARY_PREFIX: &str = "[History summary]\n";

impl ContextManager {
    /// The compaction check run unconditionally after every append.
    pub(crate) fn compact_if_needed(&mut self) {
        let threshold = self.max_tokens as f64 * COMPACTION_WATERMARK;
        if self.total_tokens() as f64 <= threshold {
            return;
        }
        debug!(
            tokens = self.total_tokens(),
            max_tokens = self.max_tokens,
            "context over watermark, compacting"
        );

        self.truncate_long_tool_results();
        if self.total_tokens() as f64 <= threshold {
            return;
        }

        self.summarize_old_rounds();
        if self.total_tokens() as f64 <= threshold {
            return;
        }

        self.scrub_intermediate_tool_results(threshold);
    }

    /// Strategy 1: cut non-pinned tool results over the length threshold down
    /// to a short prefix plus marker. Already-truncated content sits below the
    /// threshold and is never re-cut.
    fn truncate_long_tool_results(&mut self) {
        let mut truncated = 0usize;
        for (i, msg) in self.messages.iter_mut().enumerate() {
            if self.pinned.contains(&i) || msg.role != MessageRole::Tool {
                continue;
            }
            if msg.content_chars() > TOOL_RESULT_TRUNCATE_OVER
                && let Some(ref content) = msg.content
            {
                let mut kept = first_chars(content, TOOL_RESULT_TRUNCATE_KEEP);
                kept.push_str(TRUNCATED_MARKER);
                msg.content = Some(kept);
                truncated += 1;
            }
        }
        if truncated > 0 {
            debug!(truncated, "truncated long tool results");
        }
    }

    /// Strategy 2: condense all but the most recent rounds into one
    /// summary-log entry and drop them from the transcript. Runs at most once
    /// per compaction pass; re-evaluation happens on the next triggering
    /// append.
    fn summarize_old_rounds(&mut self) {
        let rounds = round_indices(&self.messages);
        if rounds.len() <= MAX_ROUNDS_BEFORE_SUMMARY {
            return;
        }

        let old_rounds = &rounds[..rounds.len() - ROUNDS_TO_KEEP];
        let old_indices: HashSet<usize> = old_rounds.iter().flatten().copied().collect();

        if let Some(summary) =
            summarize_span(&self.messages, old_rounds.iter().flatten().copied())
        {
            self.summaries.push(summary);
        }

        // Pinned messages survive the removal, but positional pins are
        // meaningless after a structural edit, so the set resets with it.
        let pinned = std::mem::take(&mut self.pinned);
        let mut index = 0usize;
        let before = self.messages.len();
        self.messages.retain(|_| {
            let keep = !old_indices.contains(&index) || pinned.contains(&index);
            index += 1;
            keep
        });

        debug!(
            removed = before - self.messages.len(),
            kept_rounds = ROUNDS_TO_KEEP,
            "summarized old rounds"
        );
    }

    /// Strategy 3: newest to oldest, overwrite tool results outside the
    /// protected tail until the watermark is satisfied or the scan is
    /// exhausted. By the time this runs the situation is severe, so pins are
    /// not honored.
    fn scrub_intermediate_tool_results(&mut self, threshold: f64) {
        let len = self.messages.len();
        for i in (0..len).rev() {
            if self.total_tokens() as f64 <= threshold {
                break;
            }
            if self.messages[i].role == MessageRole::Tool && i + SCRUB_PROTECTED_TAIL < len {
                self.messages[i].content = Some(CLEARED_PLACEHOLDER.to_string());
            }
        }
    }
}

/// Partition the transcript into rounds: each `user` message opens a round
/// that carries every following non-`user` message. Non-`user` messages
/// before the first `user` turn form a round of their own.
pub(crate) fn round_indices(messages: &[Message]) -> Vec<Vec<usize>> {
    let mut rounds: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for (i, msg) in messages.iter().enumerate() {
        if msg.role == MessageRole::User {
            if !current.is_empty() {
                rounds.push(std::mem::take(&mut current));
            }
            current.push(i);
        } else {
            current.push(i);
        }
    }
    if !current.is_empty() {
        rounds.push(current);
    }
    rounds
}

/// Build one summary entry from the given transcript positions, in order.
/// `user` messages contribute a `User:` line, `assistant` messages with
/// non-empty content an `Assistant:` line; other roles contribute nothing.
/// Returns `None` when no message produced a line.
pub(crate) fn summarize_span(
    messages: &[Message],
    indices: impl IntoIterator<Item = usize>,
) -> Option<String> {
    let mut body = String::new();
    for idx in indices {
        let Some(msg) = messages.get(idx) else {
            continue;
        };
        match msg.role {
            MessageRole::User => {
                let text = msg.content.as_deref().unwrap_or("");
                body.push_str("User: ");
                body.push_str(&first_chars(text, SUMMARY_LINE_CHARS));
                body.push('\n');
            }
            MessageRole::Assistant => {
                if let Some(content) = msg.content.as_deref()
                    && !content.is_empty()
                {
                    body.push_str("Assistant: ");
                    body.push_str(&first_chars(content, SUMMARY_LINE_CHARS));
                    body.push('\n');
                }
            }
            _ => {}
        }
    }
    if body.is_empty() {
        None
    } else {
        Some(format!("{HISTORY_SUMMARY_PREFIX}{body}"))
    }
}

/// First `n` chars of `s`. Char-based so multi-byte content never splits.
pub(crate) fn first_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
