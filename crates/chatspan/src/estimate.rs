//! Cheap, deterministic token estimation — a proxy, not a tokenizer.
//!
//! Real tokenizers are too heavy to run on every append. This estimator
//! weighs CJK characters more than everything else (they tokenize to more
//! tokens per character on typical BPE vocabularies) and adds a small fixed
//! overhead per message. Only monotonicity and relative ordering matter;
//! no value here is expected to match any real tokenizer.

use crate::Message;

/// Estimated tokens per CJK character.
pub const TOKENS_PER_CJK_CHAR: f64 = 1.5;

/// Estimated tokens per non-CJK character.
pub const TOKENS_PER_OTHER_CHAR: f64 = 0.4;

/// Fixed per-message framing overhead in tokens.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// CJK Unified Ideographs plus Extension A.
fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}

/// Estimate tokens for a piece of text. Empty text estimates to 0.
pub fn estimate_text_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let weight: f64 = text
        .chars()
        .map(|c| {
            if is_cjk(c) {
                TOKENS_PER_CJK_CHAR
            } else {
                TOKENS_PER_OTHER_CHAR
            }
        })
        .sum();
    weight.ceil() as usize
}

/// Estimate tokens for a whole message: framing overhead, role name, content,
/// and the JSON-serialized tool calls when present.
pub fn estimate_message_tokens(msg: &Message) -> usize {
    let mut tokens = MESSAGE_OVERHEAD_TOKENS;
    tokens += estimate_text_tokens(&msg.role.to_string());
    if let Some(ref content) = msg.content {
        tokens += estimate_text_tokens(content);
    }
    if let Some(ref calls) = msg.tool_calls {
        let serialized = serde_json::to_string(calls).unwrap_or_default();
        tokens += estimate_text_tokens(&serialized);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    #[test]
    fn empty_text_estimates_zero() {
        assert_eq!(estimate_text_tokens(""), 0);
    }

    #[test]
    fn appending_a_char_is_strictly_monotonic() {
        let base = "some running text";
        let with_ascii = format!("{base}a");
        let with_cjk = format!("{base}试");
        assert!(estimate_text_tokens(&with_ascii) >= estimate_text_tokens(base));
        assert!(estimate_text_tokens(&with_cjk) > estimate_text_tokens(base));
    }

    #[test]
    fn cjk_weighs_more_than_ascii_of_equal_count() {
        assert!(estimate_text_tokens("你好") > estimate_text_tokens("hi"));
        // Extension A range counts as CJK too.
        assert!(estimate_text_tokens("㐀㐁") > estimate_text_tokens("ab"));
    }

    #[test]
    fn longer_text_never_estimates_lower() {
        let mut s = String::new();
        let mut prev = 0;
        for c in "mixed 内容 with 中文 and ascii".chars() {
            s.push(c);
            let now = estimate_text_tokens(&s);
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn message_overhead_applies_to_empty_content() {
        let msg = Message::user("");
        // Overhead + the role name, nothing else.
        assert_eq!(
            estimate_message_tokens(&msg),
            MESSAGE_OVERHEAD_TOKENS + estimate_text_tokens("user")
        );
    }

    #[test]
    fn tool_calls_contribute_to_estimate() {
        let plain = Message::assistant_text("ok");
        let with_calls = Message::assistant_tool_calls(
            "ok",
            vec![ToolCall::new("call-1", "read_file", r#"{"path":"src/main.rs"}"#)],
        );
        assert!(estimate_message_tokens(&with_calls) > estimate_message_tokens(&plain));
    }
}
