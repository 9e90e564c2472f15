//! Real-time conversation hub for the Shoudan marketplace chat.
//!
//! Tracks which participants are connected to which buyer/seller
//! conversations and fans out ephemeral and durable events (messages, read
//! receipts, typing state, reactions, presence) to the connected participants
//! of each conversation.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// configuration
pub mod config;
