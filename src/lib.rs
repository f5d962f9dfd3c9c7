pub mod application;
pub mod connector;
pub mod domain;

pub use application::{prompts::BASE_INSTRUCTION, ChatClient, ChatSession};

pub use connector::{
    OllamaClient, RecordedCall, ScriptedChatClient, ScriptedReply, CLOUD_BASE_URL, DEFAULT_MODEL,
};

pub use domain::{
    decode_object, Attachment, ChatMessage, ChatOptions, DomainError, MessageLog, OutputSchema,
    Role,
};
