//! Token-budgeted conversation window manager for LLM chat transcripts.
//!
//! `chatspan` keeps a growing chat transcript (user, assistant, and tool
//! messages) within a fixed token budget for a downstream chat-completions
//! call. The core abstraction is the [`ContextManager`](manager::ContextManager):
//! an agent loop appends turns and tool results, and the manager compacts the
//! transcript through tiered, priority-aware strategies whenever estimated
//! usage crosses 85% of the ceiling. [`messages_for_request()`](manager::ContextManager::messages_for_request)
//! then yields the exact message list to hand to the model.
//!
//! # Getting started
//!
//! ```
//! use chatspan::prelude::*;
//!
//! let mut ctx = ContextManager::new(8192);
//! ctx.set_system_prompt("You are a helpful assistant.");
//! ctx.add_user_message("What's in src/main.rs?");
//! ctx.add_assistant_message("Let me read it.", None);
//! ctx.add_tool_result("call-1", "read_file", serde_json::json!("fn main() {}"));
//!
//! let messages = ctx.messages_for_request();
//! assert_eq!(messages.len(), 4); // system prompt + three transcript entries
//! println!("{}", ctx.stats().to_log_string());
//! ```
//!
//! # Where to find things
//!
//! - **Token estimation:** [`estimate`] — a cheap, deterministic proxy for
//!   tokens consumed, CJK-aware, no real tokenizer.
//! - **Transcript bookkeeping:** [`manager`] — append, pinning, system prompt,
//!   summary log, stats, and request assembly.
//! - **Automatic compaction:** [`compaction`] — the 85% watermark and the
//!   three ordered strategies (truncate long tool results, summarize old
//!   rounds, scrub intermediate tool results).
//! - **On-demand management:** [`ops`] — the `manage(action, options)`
//!   dispatch used by callers and by the LLM-facing tool.
//! - **Function-calling surface:** [`tool`] — the `manage_context` tool
//!   definition and its raw-JSON dispatch entry point.
//!
//! # Design principles
//!
//! 1. **Context is the scarcest resource.** Compaction is preventive, not
//!    corrective: it starts at 85% of the ceiling, before the budget is blown.
//!
//! 2. **The hot path never fails.** Every operation runs on each conversational
//!    turn; a thrown error there would abort an otherwise-healthy conversation.
//!    All management operations return a structured [`ManageOutcome`](ops::ManageOutcome)
//!    and degrade silently on bad input.
//!
//! 3. **Local and synchronous.** No strategy calls an LLM or blocks on I/O;
//!    compaction is deterministic given the current transcript contents.

pub mod compaction;
pub mod estimate;
pub mod manager;
pub mod ops;
pub mod prelude;
pub mod tool;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the `serde_json::Value` that the OpenAI function-calling API expects.
///
/// # Example
///
/// ```
/// use chatspan::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct PruneArgs {
///     keep_last: u32,
///     #[serde(default)]
///     dry_run: Option<bool>,
/// }
///
/// let schema = json_schema_for::<PruneArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"keep_last".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
///
/// Mirrors the chat-completions wire shape: `content` is absent on assistant
/// turns that only carry tool calls, `tool_calls` is present only on those
/// assistant turns, and `tool_call_id`/`name` identify which invocation a
/// tool-role message answers.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced a tool-role message.
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: Some(calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    /// Content length in characters, 0 when content is absent.
    pub(crate) fn content_chars(&self) -> usize {
        self.content.as_ref().map_or(0, |c| c.chars().count())
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    ///
    /// This is the standard constructor — `ToolType` is always `Function` in
    /// the current API, so there's no reason to specify it manually.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call requested by the model. Opaque to the manager except for its
/// serialized length during token estimation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}
