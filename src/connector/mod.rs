//! # Connector Layer
//!
//! Gateway adapters implementing the application's [`crate::ChatClient`]
//! boundary: the Ollama HTTP client and a scripted stand-in for tests.

pub mod adapter;

pub use adapter::*;
