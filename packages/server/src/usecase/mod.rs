//! UseCase 層
//!
//! ドメイン層の trait（レジストリ・在室インデックス・永続化コラボレーター・
//! イベント配信）に依存し、ハブの各操作のビジネスロジックを実装します。

mod authenticate;
mod disconnect;
mod error;
mod join_conversation;
mod leave_conversation;
mod notify_conversation;
mod reap_stale;
mod set_typing;

pub use authenticate::AuthenticateUseCase;
pub use disconnect::DisconnectUseCase;
pub use error::JoinConversationError;
pub use join_conversation::JoinConversationUseCase;
pub use leave_conversation::LeaveConversationUseCase;
pub use notify_conversation::NotifyConversationUseCase;
pub use reap_stale::ReapStaleConnectionsUseCase;
pub use set_typing::SetTypingUseCase;
