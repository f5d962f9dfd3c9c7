mod chat_session;
mod recovery;

pub use chat_session::*;
