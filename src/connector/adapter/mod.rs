mod ollama_client;
mod scripted_client;

pub use ollama_client::*;
pub use scripted_client::*;
