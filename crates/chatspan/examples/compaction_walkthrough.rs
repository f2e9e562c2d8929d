//! Watch the window manager compact a conversation as it grows.
//!
//! Feeds a small ceiling with simulated rounds and bulky tool results, then
//! prints the usage stats and the final request payload.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example compaction_walkthrough
//! ```

use chatspan::prelude::*;

fn main() {
    let mut ctx = ContextManager::new(2048);
    ctx.set_system_prompt("You are a helpful assistant. Be concise.");

    // Simulate ten rounds, each with a tool call producing bulky output.
    for i in 0..10 {
        ctx.add_user_message(format!("Step {i}: check the service logs again."));
        ctx.add_assistant_message(
            "Reading the logs.",
            Some(vec![ToolCall::new(
                format!("call-{i}"),
                "read_logs",
                r#"{"service":"api"}"#,
            )]),
        );
        ctx.add_tool_result(
            format!("call-{i}"),
            "read_logs",
            serde_json::json!("log line\n".repeat(120)),
        );
        println!("{}", ctx.stats().to_log_string());
    }

    // The model can also ask for cleanup itself, via the manage_context tool.
    let def = manage_context_def();
    println!("\ntool exposed to the model: {}", def.function.name);
    let result = run_manage_tool(&mut ctx, r#"{"action": "clear_old", "keep_last": 4}"#);
    println!("tool result: {result}");

    println!("\nfinal request payload:");
    for msg in ctx.messages_for_request() {
        let preview: String = msg
            .content
            .as_deref()
            .unwrap_or("<tool calls only>")
            .chars()
            .take(60)
            .collect();
        println!("  [{}] {preview}", msg.role);
    }
}
