//! Conversation hub server implementation.

mod handler;
mod server;
mod signal;
mod sweeper;
pub mod state; // UseCase 層の組み立て結果を bin から渡すため public

pub use server::Server;
