//! Transcript and pin bookkeeping for one active conversation.
//!
//! One [`ContextManager`] serves one conversation: the agent loop appends
//! turns and tool results in call/response order, and the manager keeps the
//! whole thing under the token ceiling (see [`crate::compaction`]). The
//! manager is single-threaded, synchronous state — hosts that juggle multiple
//! conversations create one manager per conversation and never share it.

use std::collections::HashSet;

use tracing::debug;

use crate::estimate::estimate_message_tokens;
use crate::{Message, ToolCall};

/// Default token ceiling for a fresh manager.
pub const DEFAULT_MAX_TOKENS: usize = 8192;

/// How many of the most recent summary-log entries are surfaced to the model.
pub(crate) const SURFACED_SUMMARIES: usize = 3;

/// Separator between surfaced summary entries.
const SUMMARY_SEPARATOR: &str = "\n---\n";

/// Header for the synthetic system message that carries surfaced summaries.
const SUMMARY_HEADER: &str = "The following is a summary of earlier parts of this conversation:\n";

/// Token-budgeted window over one conversation's transcript.
///
/// Owns the message list exclusively: callers append through the `add_*`
/// methods and read through [`messages_for_request()`](Self::messages_for_request);
/// only the manager's own compaction logic ever rewrites history.
///
/// # Example
///
/// ```
/// use chatspan::manager::ContextManager;
///
/// let mut ctx = ContextManager::new(4096);
/// ctx.set_system_prompt("You are terse.");
/// ctx.add_user_message("hello");
/// assert_eq!(ctx.stats().message_count, 1);
/// ```
pub struct ContextManager {
    /// Token ceiling used by the compaction trigger.
    pub(crate) max_tokens: usize,
    /// The transcript, in conversation order.
    pub(crate) messages: Vec<Message>,
    /// Transcript positions exempt from eviction. Positional, not stable:
    /// reset on every structural edit.
    pub(crate) pinned: HashSet<usize>,
    /// Active system prompt, independent of the transcript.
    pub(crate) system_prompt: Option<Message>,
    /// Append-only log of compacted-history summaries.
    pub(crate) summaries: Vec<String>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl ContextManager {
    /// Create a manager with the given token ceiling.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            messages: Vec::new(),
            pinned: HashSet::new(),
            system_prompt: None,
            summaries: Vec::new(),
        }
    }

    /// Replace the token ceiling. Takes effect on the next append.
    pub fn set_max_tokens(&mut self, max_tokens: usize) {
        self.max_tokens = max_tokens;
    }

    /// Replace the system prompt. Does not touch the transcript and does not
    /// trigger compaction.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(Message::system(prompt));
    }

    /// Append a user turn.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append an assistant turn, with the tool calls it requested (if any).
    /// An empty tool-call list is normalized to none.
    pub fn add_assistant_message(&mut self, content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) {
        let msg = match tool_calls {
            Some(calls) if !calls.is_empty() => Message::assistant_tool_calls(content, calls),
            _ => Message::assistant_text(content),
        };
        self.push(msg);
    }

    /// Append a tool-execution result. A JSON string passes through as-is;
    /// any other value is serialized to compact JSON.
    pub fn add_tool_result(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: serde_json::Value,
    ) {
        let content = match result {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.push(Message::tool_result(call_id, tool_name, content));
    }

    /// All appends funnel through here: push, then run the compaction check.
    fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.compact_if_needed();
    }

    /// Mark a transcript position as non-evictable. Out-of-range indices are
    /// silently ignored — pinning is a best-effort annotation, and pins do
    /// not survive structural edits (the pin set resets when a compaction
    /// pass removes rounds).
    pub fn pin_message(&mut self, index: usize) {
        if index < self.messages.len() {
            self.pinned.insert(index);
        }
    }

    /// Estimate total tokens: system prompt plus every transcript message.
    /// Recomputed from scratch on every call.
    pub fn total_tokens(&self) -> usize {
        let system = self.system_prompt.as_ref().map_or(0, estimate_message_tokens);
        system
            + self
                .messages
                .iter()
                .map(estimate_message_tokens)
                .sum::<usize>()
    }

    /// Build the complete, ordered message list for one model call:
    /// system prompt (if set), then a single synthetic system message carrying
    /// the most recent summaries (if any exist), then the live transcript.
    ///
    /// Repeated calls have no side effects; the returned messages are clones
    /// and may be serialized verbatim as the request payload.
    pub fn messages_for_request(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 2);
        if let Some(ref sys) = self.system_prompt {
            out.push(sys.clone());
        }
        if !self.summaries.is_empty() {
            let start = self.summaries.len().saturating_sub(SURFACED_SUMMARIES);
            let surfaced = self.summaries[start..].join(SUMMARY_SEPARATOR);
            out.push(Message::system(format!("{SUMMARY_HEADER}{surfaced}")));
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    /// Read-only usage snapshot.
    pub fn stats(&self) -> ContextStats {
        let tokens = self.total_tokens();
        // Guard a zero ceiling so the ratio stays finite.
        let ceiling = self.max_tokens.max(1);
        ContextStats {
            tokens,
            max_tokens: self.max_tokens,
            usage_percent: tokens as f64 / ceiling as f64 * 100.0,
            message_count: self.messages.len(),
            summary_count: self.summaries.len(),
        }
    }

    /// Empty the transcript, pin set, and summary log. The system prompt has
    /// a separate, caller-controlled lifecycle and is left untouched.
    pub fn clear(&mut self) {
        debug!(
            messages = self.messages.len(),
            summaries = self.summaries.len(),
            "clearing conversation context"
        );
        self.messages.clear();
        self.pinned.clear();
        self.summaries.clear();
    }

    /// The live transcript, in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The full summary log (only the most recent few are surfaced to the
    /// model; see [`messages_for_request()`](Self::messages_for_request)).
    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    /// Whether a transcript position is currently pinned.
    pub fn is_pinned(&self, index: usize) -> bool {
        self.pinned.contains(&index)
    }
}

/// Snapshot of context usage at a point in time.
#[derive(Debug, Clone)]
pub struct ContextStats {
    /// Estimated tokens consumed (system prompt + transcript).
    pub tokens: usize,
    /// Configured token ceiling.
    pub max_tokens: usize,
    /// Usage as a percentage of the ceiling (0.0 to 100.0+).
    pub usage_percent: f64,
    /// Number of live transcript messages.
    pub message_count: usize,
    /// Number of summary-log entries accumulated so far.
    pub summary_count: usize,
}

impl ContextStats {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.1}% of {}), {} messages, {} summaries",
            self.tokens, self.usage_percent, self.max_tokens, self.message_count, self.summary_count,
        )
    }
}
