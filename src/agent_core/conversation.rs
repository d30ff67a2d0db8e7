//! Conversation: the caller-owned transcript of one chat.
//!
//! Responsibilities:
//! - Hold the ordered message list sent to the model
//! - Keep tool results paired with the assistant message that requested them
//! - Enforce a retention limit by evicting whole exchanges, oldest first
//!
//! An *exchange* is a user message plus everything that follows it up to the
//! next user message. The system prompt and the current exchange are never
//! evicted, so the limit is a target, not a hard cap.

use std::collections::HashSet;

use crate::inference::types::{ChatMessage, Role};

use super::tokens;

/// Ordered transcript with a retention policy.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    max_messages: usize,
    evicted_messages: usize,
}

impl Conversation {
    /// Start a conversation, optionally with a system prompt.
    pub fn new(system_prompt: Option<String>, max_messages: usize) -> Self {
        let messages = system_prompt
            .filter(|p| !p.trim().is_empty())
            .map(ChatMessage::system)
            .into_iter()
            .collect();
        Self {
            messages,
            max_messages,
            evicted_messages: 0,
        }
    }

    /// All messages in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty (no system prompt, no messages).
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total messages evicted so far.
    pub fn evicted_messages(&self) -> usize {
        self.evicted_messages
    }

    /// Rough token size of the transcript.
    pub fn estimated_tokens(&self) -> u32 {
        self.messages.iter().map(tokens::estimate_message_tokens).sum()
    }

    /// Begin a new exchange. Older exchanges may be evicted to make room.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
        self.enforce_retention();
    }

    /// Append a message to the current exchange.
    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Text of the most recent assistant message, if it has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Check that every tool call has exactly one result message and every
    /// tool message answers an earlier call.
    pub fn is_well_paired(&self) -> bool {
        let mut pending: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    for call in message.tool_calls.iter().flatten() {
                        if !pending.insert(call.id.as_str()) {
                            return false;
                        }
                    }
                }
                Role::Tool => match message.tool_call_id.as_deref() {
                    Some(id) if pending.remove(id) => {}
                    _ => return false,
                },
                Role::User => {
                    if !pending.is_empty() {
                        return false;
                    }
                }
                Role::System => {}
            }
        }
        pending.is_empty()
    }

    /// Evict oldest whole exchanges until the limit is met or only the
    /// current exchange remains.
    fn enforce_retention(&mut self) {
        let start = self.evicted_messages;

        while self.messages.len() > self.max_messages {
            let prefix = self
                .messages
                .iter()
                .take_while(|m| m.role == Role::System)
                .count();

            // The exchange to evict runs from the first user message to the next one.
            let Some(next_user) = self.messages[prefix..]
                .iter()
                .skip(1)
                .position(|m| m.role == Role::User)
                .map(|i| prefix + 1 + i)
            else {
                break;
            };

            let removed = next_user - prefix;
            self.messages.drain(prefix..next_user);
            self.evicted_messages += removed;
        }

        let evicted = self.evicted_messages - start;
        if evicted > 0 {
            tracing::info!(
                evicted,
                remaining = self.messages.len(),
                max_messages = self.max_messages,
                "evicted old exchanges from conversation"
            );
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
