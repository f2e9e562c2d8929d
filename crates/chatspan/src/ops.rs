//! On-demand context management, independent of the automatic watermark.
//!
//! [`ContextManager::manage`] is the dispatch behind the LLM-facing
//! `manage_context` tool (see [`crate::tool`]) and behind host-driven
//! maintenance. Every branch returns a structured [`ManageOutcome`] — this
//! sits in the hot path of every turn, so nothing here panics or propagates
//! an error; malformed input degrades to the branch default.

use serde::Serialize;
use tracing::debug;

use crate::compaction::{first_chars, summarize_span};
use crate::manager::ContextManager;
use crate::MessageRole;

/// Default messages kept by `summarize`.
const SUMMARIZE_KEEP_DEFAULT: usize = 4;

/// Default messages kept by `clear_old`.
const CLEAR_OLD_KEEP_DEFAULT: usize = 6;

/// Messages excluded from the `summarize` span and always kept by
/// `keep_essential`.
const TAIL_ALWAYS_KEPT: usize = 3;

/// Tool results longer than this (chars) are cut by `clear_tool_results`.
const TOOL_RESULT_CLEAR_OVER: usize = 100;

/// Marker appended by `clear_tool_results`.
pub const CLEARED_ELLIPSIS: &str = "...[truncated]";

/// Options for a [`manage`](ContextManager::manage) call.
#[derive(Debug, Clone, Default)]
pub struct ManageOptions {
    /// How many of the most recent messages to keep, where the action
    /// supports it. Non-positive values fall back to the branch default.
    pub keep_last: Option<i64>,
}

impl ManageOptions {
    pub fn keep_last(n: i64) -> Self {
        Self { keep_last: Some(n) }
    }

    /// Resolve `keep_last` against a branch default. Anything that is not a
    /// positive count degrades to the default rather than erroring.
    fn effective_keep(&self, default: usize) -> usize {
        match self.keep_last {
            Some(n) if n > 0 => n as usize,
            _ => default,
        }
    }
}

/// Structured result of a management operation. Never an `Err` — failure is
/// reported in-band so a conversation is never aborted by its own janitor.
#[derive(Debug, Clone, Serialize)]
pub struct ManageOutcome {
    pub ok: bool,
    pub message: String,
}

impl ManageOutcome {
    fn done(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl ContextManager {
    /// Run one management operation by name.
    ///
    /// Recognized actions: `summarize`, `clear_old`, `clear_tool_results`,
    /// `keep_essential`. Anything else reports `ok: false` without mutating
    /// state. Structural branches reset the pin set, since positional pins do
    /// not survive transcript edits.
    pub fn manage(&mut self, action: &str, options: &ManageOptions) -> ManageOutcome {
        let outcome = match action {
            "summarize" => self.manage_summarize(options),
            "clear_old" => self.manage_clear_old(options),
            "clear_tool_results" => self.manage_clear_tool_results(),
            "keep_essential" => self.manage_keep_essential(),
            _ => ManageOutcome::failed(format!("unknown context operation: {action}")),
        };
        debug!(action, ok = outcome.ok, outcome = %outcome.message, "manage context");
        outcome
    }

    /// Summarize everything but the last few messages into the summary log,
    /// then keep only the most recent `keep_last` (default 4). The transcript
    /// is trimmed only when the summary came out non-empty — summarizing
    /// nothing and then discarding history would lose information for free.
    fn manage_summarize(&mut self, options: &ManageOptions) -> ManageOutcome {
        let span_end = self.messages.len().saturating_sub(TAIL_ALWAYS_KEPT);
        if let Some(summary) = summarize_span(&self.messages, 0..span_end) {
            self.summaries.push(summary);
            let keep = options.effective_keep(SUMMARIZE_KEEP_DEFAULT);
            if self.messages.len() > keep {
                let cut = self.messages.len() - keep;
                self.messages.drain(..cut);
                self.pinned.clear();
            }
        }
        ManageOutcome::done("context compressed into a summary")
    }

    /// Keep only the last `keep_last` (default 6) messages.
    fn manage_clear_old(&mut self, options: &ManageOptions) -> ManageOutcome {
        let keep = options.effective_keep(CLEAR_OLD_KEEP_DEFAULT);
        if self.messages.len() <= keep {
            return ManageOutcome::done("nothing to clear");
        }
        let removed = self.messages.len() - keep;
        self.messages.drain(..removed);
        self.pinned.clear();
        ManageOutcome::done(format!("removed {removed} old messages"))
    }

    /// Cut every tool result over 100 chars down to 100 chars plus an
    /// ellipsis marker. Content-only edit: pins stay valid.
    fn manage_clear_tool_results(&mut self) -> ManageOutcome {
        let mut cleared = 0usize;
        for msg in &mut self.messages {
            if msg.role != MessageRole::Tool {
                continue;
            }
            if msg.content_chars() > TOOL_RESULT_CLEAR_OVER
                && let Some(ref content) = msg.content
            {
                let mut kept = first_chars(content, TOOL_RESULT_CLEAR_OVER);
                kept.push_str(CLEARED_ELLIPSIS);
                msg.content = Some(kept);
                cleared += 1;
            }
        }
        ManageOutcome::done(format!("cleared {cleared} tool results"))
    }

    /// Keep user and system messages, assistant messages that actually said
    /// something, and the last few positions regardless of role.
    fn manage_keep_essential(&mut self) -> ManageOutcome {
        let len = self.messages.len();
        let tail_start = len.saturating_sub(TAIL_ALWAYS_KEPT);
        let mut index = 0usize;
        self.messages.retain(|msg| {
            let essential = match msg.role {
                MessageRole::User | MessageRole::System => true,
                MessageRole::Assistant => msg.content.as_deref().is_some_and(|c| !c.is_empty()),
                MessageRole::Tool => false,
            };
            let keep = essential || index >= tail_start;
            index += 1;
            keep
        });
        self.pinned.clear();
        ManageOutcome::done("kept essential messages only")
    }

    /// The maintenance policy a hosting agent loop runs between turns:
    /// above 70% usage clear long tool results, above 85% summarize down to
    /// the last 6 messages. Both checks read the same usage snapshot.
    pub fn maintain(&mut self) {
        let usage = self.stats().usage_percent;
        if usage > 70.0 {
            self.manage("clear_tool_results", &ManageOptions::default());
        }
        if usage > 85.0 {
            self.manage("summarize", &ManageOptions::keep_last(6));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ContextManager;

    /// A manager with `n` alternating user/assistant messages and a ceiling
    /// high enough that automatic compaction never interferes.
    fn filled(n: usize) -> ContextManager {
        let mut ctx = ContextManager::new(1_000_000);
        for i in 0..n {
            if i % 2 == 0 {
                ctx.add_user_message(format!("message {i}"));
            } else {
                ctx.add_assistant_message(format!("message {i}"), None);
            }
        }
        ctx
    }

    #[test]
    fn clear_old_keeps_last_three_of_ten() {
        let mut ctx = filled(10);
        let outcome = ctx.manage("clear_old", &ManageOptions::keep_last(3));
        assert!(outcome.ok);
        assert!(outcome.message.contains('7'));
        assert_eq!(ctx.messages().len(), 3);
        assert_eq!(ctx.messages()[0].content.as_deref(), Some("message 7"));
    }

    #[test]
    fn clear_old_within_bound_is_a_no_op() {
        let mut ctx = filled(4);
        let outcome = ctx.manage("clear_old", &ManageOptions::default());
        assert!(outcome.ok);
        assert_eq!(outcome.message, "nothing to clear");
        assert_eq!(ctx.messages().len(), 4);
    }

    #[test]
    fn clear_old_default_keeps_six() {
        let mut ctx = filled(10);
        ctx.manage("clear_old", &ManageOptions::default());
        assert_eq!(ctx.messages().len(), 6);
    }

    #[test]
    fn clear_tool_results_truncates_to_100_plus_marker() {
        let mut ctx = ContextManager::new(1_000_000);
        ctx.add_user_message("q");
        ctx.add_tool_result("c1", "shell", serde_json::json!("x".repeat(500)));

        let outcome = ctx.manage("clear_tool_results", &ManageOptions::default());
        assert!(outcome.ok);
        assert!(outcome.message.contains('1'));

        let content = ctx.messages()[1].content.as_deref().unwrap();
        assert_eq!(content.chars().count(), 100 + CLEARED_ELLIPSIS.len());
        assert!(content.ends_with(CLEARED_ELLIPSIS));
    }

    #[test]
    fn clear_tool_results_leaves_short_results_alone() {
        let mut ctx = ContextManager::new(1_000_000);
        ctx.add_tool_result("c1", "shell", serde_json::json!("short"));
        let outcome = ctx.manage("clear_tool_results", &ManageOptions::default());
        assert!(outcome.message.contains('0'));
        assert_eq!(ctx.messages()[0].content.as_deref(), Some("short"));
    }

    #[test]
    fn summarize_trims_and_records() {
        let mut ctx = filled(10);
        let outcome = ctx.manage("summarize", &ManageOptions::default());
        assert!(outcome.ok);
        assert_eq!(ctx.summaries().len(), 1);
        assert_eq!(ctx.messages().len(), 4);
        // The span excludes the last 3 messages.
        assert!(ctx.summaries()[0].contains("message 6"));
        assert!(!ctx.summaries()[0].contains("message 7"));
    }

    #[test]
    fn summarize_of_nothing_keeps_transcript() {
        let mut ctx = ContextManager::new(1_000_000);
        // Only tool messages: the summary span produces no lines, so nothing
        // may be discarded either.
        for i in 0..6 {
            ctx.add_tool_result(format!("c{i}"), "probe", serde_json::json!("out"));
        }
        let outcome = ctx.manage("summarize", &ManageOptions::keep_last(2));
        assert!(outcome.ok);
        assert_eq!(ctx.summaries().len(), 0);
        assert_eq!(ctx.messages().len(), 6);
    }

    #[test]
    fn keep_essential_drops_tool_noise_but_keeps_the_tail() {
        let mut ctx = ContextManager::new(1_000_000);
        ctx.add_user_message("task"); // 0: essential
        ctx.add_assistant_message("", None); // 1: empty assistant, dropped
        ctx.add_tool_result("c1", "t", serde_json::json!("noise")); // 2: dropped
        ctx.add_assistant_message("found it", None); // 3: essential
        ctx.add_tool_result("c2", "t", serde_json::json!("tail noise")); // 4: tail
        ctx.add_assistant_message("", None); // 5: tail
        ctx.add_user_message("next"); // 6: tail + essential

        let outcome = ctx.manage("keep_essential", &ManageOptions::default());
        assert!(outcome.ok);
        let contents: Vec<_> = ctx
            .messages()
            .iter()
            .map(|m| m.content.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(contents, vec!["task", "found it", "tail noise", "", "next"]);
    }

    #[test]
    fn structural_ops_reset_pins() {
        let mut ctx = filled(10);
        ctx.pin_message(9);
        ctx.manage("clear_old", &ManageOptions::keep_last(3));
        assert!(!ctx.is_pinned(9));
        assert!(!ctx.is_pinned(2));
    }

    #[test]
    fn unknown_action_reports_failure_without_mutation() {
        let mut ctx = filled(4);
        let outcome = ctx.manage("defragment", &ManageOptions::default());
        assert!(!outcome.ok);
        assert!(outcome.message.contains("unknown"));
        assert_eq!(ctx.messages().len(), 4);
    }

    #[test]
    fn degenerate_inputs_never_panic() {
        let mut empty = ContextManager::new(0);
        for action in ["summarize", "clear_old", "clear_tool_results", "keep_essential", "", "???"] {
            for keep in [None, Some(0), Some(-5), Some(i64::MIN), Some(i64::MAX)] {
                let outcome = empty.manage(action, &ManageOptions { keep_last: keep });
                assert!(!outcome.message.is_empty());
            }
        }
    }

    #[test]
    fn non_positive_keep_last_falls_back_to_default() {
        let mut ctx = filled(10);
        ctx.manage("clear_old", &ManageOptions::keep_last(-3));
        assert_eq!(ctx.messages().len(), 6);
    }

    #[test]
    fn maintain_clears_tool_results_above_70_percent() {
        let mut ctx = ContextManager::new(1_000_000);
        ctx.add_user_message("q");
        ctx.add_tool_result("c1", "read_file", serde_json::json!("y".repeat(400)));
        // Shrink the ceiling so the existing transcript sits around 75%.
        ctx.set_max_tokens(230);

        ctx.maintain();
        let content = ctx.messages()[1].content.as_deref().unwrap();
        assert!(content.ends_with(CLEARED_ELLIPSIS));
        // Below 85%: no summarization happened.
        assert_eq!(ctx.summaries().len(), 0);
    }

    #[test]
    fn maintain_summarizes_above_85_percent() {
        let mut ctx = ContextManager::new(1_000_000);
        for i in 0..8 {
            ctx.add_user_message(format!("question number {i}"));
            ctx.add_assistant_message(format!("answer number {i}"), None);
        }
        ctx.set_max_tokens(100);

        ctx.maintain();
        assert_eq!(ctx.summaries().len(), 1);
        assert!(ctx.messages().len() <= 6);
    }

    #[test]
    fn maintain_under_both_thresholds_is_a_no_op() {
        let mut ctx = ContextManager::new(1_000_000);
        ctx.add_user_message("hello");
        ctx.maintain();
        assert_eq!(ctx.messages().len(), 1);
        assert_eq!(ctx.summaries().len(), 0);
    }
}
