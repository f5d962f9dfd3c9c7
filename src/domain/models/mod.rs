mod chat_options;
mod message;
mod message_log;

pub use chat_options::*;
pub use message::*;
pub use message_log::*;
