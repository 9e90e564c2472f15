//! UseCase: 会話ルーム退出処理
//!
//! 明示的な `leave_conversation` コマンドだけでなく、別ルームへの入室時の
//! 暗黙退出と、切断・強制退去時のクリーンアップもこのユースケースを通ります。

use std::sync::Arc;

use crate::domain::{ConversationId, EventPusher, MembershipIndex, TypingStore, UserId};

/// 会話ルーム退出のユースケース
pub struct LeaveConversationUseCase {
    /// MembershipIndex（在室インデックスの抽象化）
    membership: Arc<dyn MembershipIndex>,
    /// TypingStore（入力中インジケーターの抽象化）
    typing_store: Arc<dyn TypingStore>,
    /// EventPusher（イベント配信の抽象化）
    pusher: Arc<dyn EventPusher>,
}

impl LeaveConversationUseCase {
    /// 新しい LeaveConversationUseCase を作成
    pub fn new(
        membership: Arc<dyn MembershipIndex>,
        typing_store: Arc<dyn TypingStore>,
        pusher: Arc<dyn EventPusher>,
    ) -> Self {
        Self {
            membership,
            typing_store,
            pusher,
        }
    }

    /// 退出を実行
    ///
    /// 在室インデックスからの削除と入力中インジケーターの停止を行います。
    /// インジケーターの停止はベストエフォート（ミラーの書き込み失敗は
    /// ログに残して無視）。在室していないユーザーの退出は no-op です。
    ///
    /// # Arguments
    ///
    /// * `user_id` - 退出するユーザーの ID（Domain Model）
    /// * `conversation_id` - 退出する会話の ID（Domain Model）
    ///
    /// # Returns
    ///
    /// 通知対象（残りの在室者）のユーザー ID リスト
    pub async fn execute(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Vec<UserId> {
        self.membership
            .remove_member(conversation_id, user_id)
            .await;

        if let Err(e) = self
            .typing_store
            .set_typing(conversation_id.clone(), user_id.clone(), false)
            .await
        {
            tracing::warn!(
                "Failed to stop typing indicator for user '{}' in conversation '{}': {}",
                user_id.as_str(),
                conversation_id.as_str(),
                e
            );
        }

        self.membership
            .members_of(conversation_id)
            .await
            .into_iter()
            .filter(|id| id != user_id)
            .collect()
    }

    /// ユーザーが退出したことを残りの在室者にブロードキャスト
    ///
    /// # Arguments
    ///
    /// * `targets` - ブロードキャスト対象のユーザー ID リスト（Domain Model）
    /// * `message` - ブロードキャストするメッセージ（JSON）
    pub async fn broadcast_user_left(
        &self,
        targets: Vec<UserId>,
        message: &str,
    ) -> Result<(), String> {
        self.pusher
            .broadcast(targets, message)
            .await
            .map_err(|e| e.to_string())
    }
}
