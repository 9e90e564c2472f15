//! Server state and connection management.

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, MembershipIndex};
use crate::usecase::{
    AuthenticateUseCase, DisconnectUseCase, JoinConversationUseCase, LeaveConversationUseCase,
    NotifyConversationUseCase, SetTypingUseCase,
};

/// Shared application state
pub struct AppState {
    /// AuthenticateUseCase（接続認証のユースケース）
    pub authenticate_usecase: Arc<AuthenticateUseCase>,
    /// JoinConversationUseCase（入室のユースケース）
    pub join_conversation_usecase: Arc<JoinConversationUseCase>,
    /// LeaveConversationUseCase（退出のユースケース）
    pub leave_conversation_usecase: Arc<LeaveConversationUseCase>,
    /// SetTypingUseCase（入力中インジケーターのユースケース）
    pub set_typing_usecase: Arc<SetTypingUseCase>,
    /// NotifyConversationUseCase（ファンアウトのユースケース）
    pub notify_conversation_usecase: Arc<NotifyConversationUseCase>,
    /// DisconnectUseCase（切断のユースケース）
    pub disconnect_usecase: Arc<DisconnectUseCase>,
    /// ConnectionRegistry（heartbeat 更新と診断用）
    pub registry: Arc<dyn ConnectionRegistry>,
    /// MembershipIndex（診断用）
    pub membership: Arc<dyn MembershipIndex>,
}
