use crate::domain::models::{ChatMessage, Role};

/// Ordered conversation history owned by a single session.
///
/// Turn 0 is always the active system instruction: it is rewritten per
/// structured request (never appended) and can never be removed. All other
/// turns are appended in conversational order.
#[derive(Debug, Clone)]
pub struct MessageLog {
    turns: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatMessage::system(system_instruction)],
        }
    }

    /// Rewrites the system turn. Always a full overwrite.
    pub fn set_system(&mut self, instruction: impl Into<String>) {
        self.turns[0].set_content(instruction.into());
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.turns.push(message);
    }

    /// Removes and returns the most recent turn. The system turn is never
    /// removed; popping an otherwise-empty log returns `None`.
    pub fn pop(&mut self) -> Option<ChatMessage> {
        if self.turns.len() > 1 {
            self.turns.pop()
        } else {
            None
        }
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        // Never true in practice: the system turn is permanent.
        self.turns.is_empty()
    }

    pub fn system_instruction(&self) -> &str {
        self.turns[0].content()
    }
}
