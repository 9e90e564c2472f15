//! Infrastructure 層
//!
//! ドメイン層が定義する trait の具体的な実装を提供します。
//! 現在はすべてインメモリ実装です（単一プロセス・単一ノード前提）。

pub mod pusher;
pub mod registry;
pub mod repository;
