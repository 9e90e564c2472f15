//! 永続化コラボレーターの実装

mod inmemory;

pub use inmemory::{InMemoryConversationStore, InMemoryTypingStore};
