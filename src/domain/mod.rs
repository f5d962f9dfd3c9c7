//! # Domain Layer
//!
//! Core models, the schema adapter, and the error taxonomy.
//! This layer is independent of any transport or backend.

pub mod error;
pub mod models;
pub mod schema;

pub use error::*;
pub use models::*;
pub use schema::*;
