use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::application::ChatClient;
use crate::domain::{ChatMessage, ChatOptions, DomainError};

/// One scripted gateway outcome.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    TransportError(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn transport_error(reason: impl Into<String>) -> Self {
        Self::TransportError(reason.into())
    }
}

/// A record of one `chat` invocation, for asserting on protocol behavior.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A [`ChatClient`] that replays a scripted sequence of outcomes and records
/// every call it receives. Deterministic stand-in for a live backend in
/// tests and offline runs; replies are consumed front-to-back, and running
/// past the script is a transport error.
pub struct ScriptedChatClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Appends a reply to the end of the script.
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.replies.lock().expect("script lock").push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Default for ScriptedChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<String, DomainError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        });

        let reply = self.replies.lock().expect("script lock").pop_front();
        debug!(
            "ScriptedChatClient: call {} with {} messages",
            self.call_count(),
            messages.len()
        );

        match reply {
            Some(ScriptedReply::Text(content)) => Ok(content),
            Some(ScriptedReply::TransportError(reason)) => Err(DomainError::transport(reason)),
            None => Err(DomainError::transport("scripted replies exhausted")),
        }
    }
}
