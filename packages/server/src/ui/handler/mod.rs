//! Protocol dispatcher (WebSocket) and HTTP endpoint handlers.

mod http;
mod websocket;

pub use http::{get_connections, get_conversation_members, get_typing_users, health_check};
pub use websocket::websocket_handler;
