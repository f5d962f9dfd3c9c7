use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::interfaces::ChatClient;
use crate::application::prompts;
use crate::application::use_cases::recovery::{backoff_delay, RecoveryState, MAX_ATTEMPTS};
use crate::domain::{
    Attachment, ChatMessage, ChatOptions, DomainError, MessageLog, OutputSchema,
};

/// A conversation session that can coerce model output into typed values.
///
/// Owns the message log; the gateway handle may be shared. Requests take
/// `&mut self`, so a session carries at most one in-flight request — callers
/// needing concurrency hold one session each or serialize externally.
pub struct ChatSession {
    client: Arc<dyn ChatClient>,
    model: String,
    instruction: String,
    log: MessageLog,
    track_history: bool,
    last_response: Option<String>,
    options: ChatOptions,
}

impl ChatSession {
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            instruction: prompts::BASE_INSTRUCTION.to_string(),
            log: MessageLog::new(prompts::BASE_INSTRUCTION),
            track_history: false,
            last_response: None,
            options: ChatOptions::default(),
        }
    }

    /// Replaces the base instruction the system turn is derived from.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self.log.set_system(self.instruction.clone());
        self
    }

    /// Keeps user/assistant turns in the log across requests. Off by
    /// default: non-tracked sessions are stateless beyond the system turn.
    pub fn with_history_tracking(mut self, track: bool) -> Self {
        self.track_history = track;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn is_tracking_history(&self) -> bool {
        self.track_history
    }

    /// Raw text of the most recent model response, if any request has run.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Plain free-form request: no schema, no recovery.
    pub async fn ask(
        &mut self,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, DomainError> {
        self.log.set_system(self.instruction.clone());
        self.round_trip(prompt, attachment).await
    }

    /// Structured request: advertises `T`'s schema through the system turn,
    /// decodes and validates the reply, and drives the recovery loop on
    /// decode/validation failure. Returns the typed value or one terminal
    /// error describing the root cause.
    pub async fn ask_structured<T: OutputSchema>(
        &mut self,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> Result<T, DomainError> {
        let schema = T::describe();
        self.log.set_system(prompts::structured_system_instruction(
            &self.instruction,
            &schema,
        ));

        let raw = self.round_trip(prompt, attachment.clone()).await?;

        match T::from_raw(&raw) {
            Ok(value) => Ok(value),
            Err(failure) if failure.is_retryable() => {
                warn!("Structured output attempt 1 failed: {failure}");
                self.recover(prompt, attachment, &schema, failure).await
            }
            Err(other) => Err(other),
        }
    }

    /// One gateway round-trip with history bookkeeping: the user turn is
    /// appended for the call and either persisted alongside the assistant
    /// reply (tracking on) or removed afterwards (tracking off). A transport
    /// failure removes it in both modes — no half-exchange survives.
    async fn round_trip(
        &mut self,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, DomainError> {
        let mut user = ChatMessage::user(prompt);
        if let Some(attachment) = attachment {
            user = user.with_attachment(attachment);
        }
        self.log.push(user);

        match self
            .client
            .chat(&self.model, self.log.turns(), &self.options)
            .await
        {
            Ok(raw) => {
                debug!("Raw model response: {raw}");
                if self.track_history {
                    self.log.push(ChatMessage::assistant(raw.clone()));
                } else {
                    self.log.pop();
                }
                self.last_response = Some(raw.clone());
                Ok(raw)
            }
            Err(e) => {
                self.log.pop();
                Err(e)
            }
        }
    }

    /// Drives the recovery state machine after a failed first attempt.
    async fn recover<T: OutputSchema>(
        &mut self,
        prompt: &str,
        attachment: Option<Attachment>,
        schema: &str,
        first_failure: DomainError,
    ) -> Result<T, DomainError> {
        let mut state = RecoveryState::Attempting {
            attempt: 2,
            failure: first_failure,
        };

        loop {
            state = match state {
                RecoveryState::Attempting { attempt, failure } => {
                    let delay = backoff_delay(attempt);
                    debug!("Waiting {delay:?} before recovery attempt {attempt}");
                    tokio::time::sleep(delay).await;

                    let messages =
                        self.recovery_messages(prompt, attachment.as_ref(), schema, &failure);
                    // Transport failures abort here; the retry budget is
                    // for decode/validation failures only.
                    let raw = self
                        .client
                        .chat(&self.model, &messages, &self.options)
                        .await?;
                    debug!("Raw recovery response: {raw}");
                    self.last_response = Some(raw.clone());

                    match T::from_raw(&raw) {
                        Ok(value) => RecoveryState::Succeeded(value),
                        Err(next) if next.is_retryable() && attempt < MAX_ATTEMPTS => {
                            warn!("Structured output attempt {attempt} failed: {next}");
                            RecoveryState::Attempting {
                                attempt: attempt + 1,
                                failure: next,
                            }
                        }
                        Err(next) if next.is_retryable() => RecoveryState::Exhausted {
                            attempts: MAX_ATTEMPTS,
                            failure: next,
                        },
                        Err(other) => return Err(other),
                    }
                }
                RecoveryState::Succeeded(value) => {
                    info!("Structured output recovered");
                    return Ok(value);
                }
                RecoveryState::Exhausted { attempts, failure } => {
                    warn!("Structured output exhausted after {attempts} attempts: {failure}");
                    return Err(DomainError::exhausted(attempts, failure));
                }
            };
        }
    }

    /// Transient message set for one recovery attempt: the current log, the
    /// failed exchange (reconstructed when tracking already removed it), and
    /// the recovery directive. Never enters the log itself.
    fn recovery_messages(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
        schema: &str,
        failure: &DomainError,
    ) -> Vec<ChatMessage> {
        let mut messages = self.log.turns().to_vec();

        if !self.track_history {
            let mut user = ChatMessage::user(prompt);
            if let Some(attachment) = attachment {
                user = user.with_attachment(attachment.clone());
            }
            messages.push(user);
            if let Some(last) = &self.last_response {
                messages.push(ChatMessage::assistant(last.clone()));
            }
        }

        messages.push(ChatMessage::user(prompts::recovery_instruction(
            schema,
            &failure.to_string(),
        )));

        messages
    }
}
