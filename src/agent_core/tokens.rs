//! Text budgeting helpers.
//!
//! Character-based token estimates are used only for logging how large the
//! transcript has grown; nothing is cut based on them.

use crate::inference::types::{ChatMessage, Role};

/// Average characters per token for English prose.
const CHARS_PER_TOKEN: f64 = 3.2;

/// Average characters per token for JSON content (tool arguments and results).
const JSON_CHARS_PER_TOKEN: f64 = 2.8;

/// Per-message overhead (role label, formatting tokens).
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

// ─── UTF-8 Safe Truncation ──────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Estimation ─────────────────────────────────────────────────────────────

/// Estimate tokens for natural-language text.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() as f64 / CHARS_PER_TOKEN).ceil() as u32
}

/// Estimate tokens for JSON text.
pub fn estimate_json_tokens(text: &str) -> u32 {
    (text.len() as f64 / JSON_CHARS_PER_TOKEN).ceil() as u32
}

/// Estimate tokens for one transcript message.
pub fn estimate_message_tokens(message: &ChatMessage) -> u32 {
    let mut total = MESSAGE_OVERHEAD_TOKENS;

    if let Some(ref content) = message.content {
        total += match message.role {
            Role::Tool => estimate_json_tokens(content),
            _ => estimate_tokens(content),
        };
    }

    if let Some(ref calls) = message.tool_calls {
        for call in calls {
            total += estimate_tokens(&call.function.name);
            total += estimate_json_tokens(&call.function.arguments);
        }
    }

    total
}

// ─── Tests ──────────────────────────────────────────────────────────────────
