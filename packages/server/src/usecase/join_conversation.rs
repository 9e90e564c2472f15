//! UseCase: 会話ルーム入室処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinConversationUseCase::execute() メソッド
//! - 入室処理（認可チェック、在室インデックスへの追加、通知対象選定）
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：当事者（買い手・売り手）以外の入室を拒否する
//! - 拒否時に在室インデックスが変化しないことを保証
//! - 認可照会のストア障害が拒否として扱われる（接続は落とさない）ことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：当事者の入室と、既存在室者への通知対象選定
//! - 異常系：第三者の入室試行、認可照会の失敗
//! - エッジケース：誰も在室していないルームへの入室（通知対象なし）

use std::sync::Arc;

use crate::domain::{
    ConversationId, ConversationStore, EventPusher, MembershipIndex, UserId,
};

use super::error::JoinConversationError;

/// 会話ルーム入室のユースケース
pub struct JoinConversationUseCase {
    /// ConversationStore（認可照会先の抽象化）
    conversation_store: Arc<dyn ConversationStore>,
    /// MembershipIndex（在室インデックスの抽象化）
    membership: Arc<dyn MembershipIndex>,
    /// EventPusher（イベント配信の抽象化）
    pusher: Arc<dyn EventPusher>,
}

impl JoinConversationUseCase {
    /// 新しい JoinConversationUseCase を作成
    pub fn new(
        conversation_store: Arc<dyn ConversationStore>,
        membership: Arc<dyn MembershipIndex>,
        pusher: Arc<dyn EventPusher>,
    ) -> Self {
        Self {
            conversation_store,
            membership,
            pusher,
        }
    }

    /// 入室を実行
    ///
    /// ホットパスで唯一、永続化コラボレーターへ同期的に問い合わせる箇所です。
    /// 照会に失敗した場合はアクセス拒否として扱います（接続は維持）。
    ///
    /// # Arguments
    ///
    /// * `user_id` - 入室するユーザーの ID（Domain Model）
    /// * `conversation_id` - 入室先の会話 ID（Domain Model）
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<UserId>)` - 通知対象（入室前からの在室者）のユーザー ID リスト
    /// * `Err(JoinConversationError)` - 入室拒否。在室インデックスは変化しない
    pub async fn execute(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<UserId>, JoinConversationError> {
        // 1. 認可チェック（買い手または売り手であること）
        let authorized = match self
            .conversation_store
            .is_participant(conversation_id, user_id)
            .await
        {
            Ok(authorized) => authorized,
            Err(e) => {
                tracing::warn!(
                    "Authorization lookup failed for user '{}' on conversation '{}': {}",
                    user_id.as_str(),
                    conversation_id.as_str(),
                    e
                );
                false
            }
        };
        if !authorized {
            return Err(JoinConversationError::AccessDenied(
                conversation_id.as_str().to_string(),
            ));
        }

        // 2. 通知対象を取得（入室前からの在室者。再入室でも自分自身は除く）
        let targets: Vec<UserId> = self
            .membership
            .members_of(conversation_id)
            .await
            .into_iter()
            .filter(|id| id != user_id)
            .collect();

        // 3. 在室インデックスに追加
        self.membership
            .add_member(conversation_id.clone(), user_id.clone())
            .await;

        Ok(targets)
    }

    /// ユーザーが入室したことを既存の在室者にブロードキャスト
    ///
    /// # Arguments
    ///
    /// * `targets` - ブロードキャスト対象のユーザー ID リスト（Domain Model）
    /// * `message` - ブロードキャストするメッセージ（JSON）
    pub async fn broadcast_user_joined(
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
