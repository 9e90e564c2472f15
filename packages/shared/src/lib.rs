//! Shared library for the Shoudan conversation hub.
//!
//! Cross-cutting utilities used by the server crate: time handling with a
//! clock abstraction, and logging setup.

pub mod logger;
pub mod time;
