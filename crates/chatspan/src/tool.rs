//! The `manage_context` function-calling surface.
//!
//! Exposes the manual management operations of [`crate::ops`] to the model
//! itself: the tool definition goes out with every request, and when the
//! model calls it, the raw JSON arguments come back through
//! [`run_manage_tool`]. Errors are returned as in-band `ok: false` outcomes
//! rather than panics or `Err` — the result string goes straight back to the
//! LLM as a tool result regardless.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::json_schema_for;
use crate::manager::ContextManager;
use crate::ops::{ManageOptions, ManageOutcome};
use crate::ToolDef;

/// Name under which the tool is exposed to the model.
pub const MANAGE_CONTEXT_TOOL_NAME: &str = "manage_context";

/// The management operations callable through the tool. Closed set: anything
/// else fails JSON-argument validation before reaching the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ManageContextAction {
    Summarize,
    ClearOld,
    ClearToolResults,
    KeepEssential,
}

impl ManageContextAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ManageContextAction::Summarize => "summarize",
            ManageContextAction::ClearOld => "clear_old",
            ManageContextAction::ClearToolResults => "clear_tool_results",
            ManageContextAction::KeepEssential => "keep_essential",
        }
    }
}

/// Arguments for the `manage_context` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ManageContextArgs {
    /// Which management operation to run.
    pub action: ManageContextAction,
    /// Keep the most recent N messages, for operations that prune. Optional;
    /// each operation has its own default.
    #[serde(default)]
    pub keep_last: Option<i64>,
}

/// The tool definition advertised to the model, with its parameter schema
/// derived from [`ManageContextArgs`].
pub fn manage_context_def() -> ToolDef {
    ToolDef::new(
        MANAGE_CONTEXT_TOOL_NAME,
        "Compact or prune the conversation context when it grows too large. \
         Actions: 'summarize' compresses older messages into a summary, \
         'clear_old' drops all but the most recent messages, \
         'clear_tool_results' truncates bulky tool output, \
         'keep_essential' keeps only user turns and substantive replies.",
        json_schema_for::<ManageContextArgs>(),
    )
}

/// Dispatch a raw tool invocation against the manager.
///
/// Parses the model-supplied JSON arguments, runs the operation, and returns
/// the JSON-serialized [`ManageOutcome`]. Malformed arguments (bad JSON,
/// unknown action, wrong types) produce an `ok: false` outcome — never a
/// panic, never an `Err`.
pub fn run_manage_tool(manager: &mut ContextManager, arguments: &str) -> String {
    let outcome = match serde_json::from_str::<ManageContextArgs>(arguments) {
        Ok(args) => manager.manage(
            args.action.as_str(),
            &ManageOptions {
                keep_last: args.keep_last,
            },
        ),
        Err(e) => ManageOutcome {
            ok: false,
            message: format!("invalid manage_context arguments: {e}"),
        },
    };
    serde_json::to_string(&outcome)
        .unwrap_or_else(|_| r#"{"ok":false,"message":"failed to encode outcome"}"#.to_string())
}
