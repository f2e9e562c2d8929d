//! Prelude for common imports.
//!
//! ```
//! use chatspan::prelude::*;
//! ```

pub use crate::estimate::{estimate_message_tokens, estimate_text_tokens};
pub use crate::manager::{ContextManager, ContextStats, DEFAULT_MAX_TOKENS};
pub use crate::ops::{ManageOptions, ManageOutcome};
pub use crate::tool::{
    ManageContextAction, ManageContextArgs, manage_context_def, run_manage_tool,
    MANAGE_CONTEXT_TOOL_NAME,
};
pub use crate::{Message, MessageRole, ToolCall, ToolDef};
