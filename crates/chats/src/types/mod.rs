//! Shared types for the chat relay.

pub mod errors;

pub use errors::{ChatError, ChatResult};
