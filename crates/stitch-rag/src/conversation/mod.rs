//! Bounded conversation history

mod memory;

pub use memory::{estimate_tokens, ConversationMemory, Turn};
