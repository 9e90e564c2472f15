//! UseCase: 会話ルームへのイベント配信（ファンアウト）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - NotifyConversationUseCase の broadcast_event() と notify_*() メソッド
//! - 在室者から除外対象を引いた宛先への配信
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：N 人在室で除外 1 人なら N−1 人に届くこと
//! - 切断済みの在室者がスキップされ、エラーにならないこと
//! - 外部 HTTP 層向けの notify API がディスパッチャを通らず配信できること
//!
//! ### どのような状況を想定しているか
//! - 正常系：除外あり・なしの配信
//! - エッジケース：誰も在室していないルーム、在室しているが切断済みのユーザー

use std::sync::Arc;

use serde_json::Value;

use shoudan_shared::time::{now_utc_millis, timestamp_to_rfc3339};

use crate::domain::{
    ConversationId, EventPusher, MembershipIndex, MessageId, ServerEvent, UserId,
};

/// 会話ルームへのイベント配信のユースケース
///
/// WebSocket ハンドラのメッセージ中継と、外部 HTTP 層が永続化後に呼ぶ
/// notify API の両方がここを通ります（後者はディスパッチャをバイパス）。
pub struct NotifyConversationUseCase {
    /// MembershipIndex（在室インデックスの抽象化）
    membership: Arc<dyn MembershipIndex>,
    /// EventPusher（イベント配信の抽象化）
    pusher: Arc<dyn EventPusher>,
}

impl NotifyConversationUseCase {
    /// 新しい NotifyConversationUseCase を作成
    pub fn new(membership: Arc<dyn MembershipIndex>, pusher: Arc<dyn EventPusher>) -> Self {
        Self { membership, pusher }
    }

    /// ルームの在室者（除外対象を除く）へイベントを配信する
    ///
    /// 配信は at-most-once・ベストエフォート。在室リストに居るが接続が
    /// 切れているユーザーはスキップされます（リトライもキューイングもしない）。
    ///
    /// # Returns
    ///
    /// 実際に配信対象となったユーザー ID リスト
    pub async fn broadcast_event(
        &self,
        conversation_id: &ConversationId,
        exclude: Option<&UserId>,
        event: &ServerEvent,
    ) -> Vec<UserId> {
        let targets: Vec<UserId> = self
            .membership
            .members_of(conversation_id)
            .await
            .into_iter()
            .filter(|id| Some(id) != exclude)
            .collect();

        if targets.is_empty() {
            return targets;
        }

        if let Err(e) = self.pusher.broadcast(targets.clone(), &event.to_json()).await {
            tracing::warn!(
                "Broadcast to conversation '{}' failed: {}",
                conversation_id.as_str(),
                e
            );
        }

        targets
    }

    /// 新着メッセージを在室者へ通知する（外部 HTTP 層が永続化後に呼ぶ）
    pub async fn notify_new_message(
        &self,
        conversation_id: &ConversationId,
        message_id: Option<MessageId>,
        message: Value,
        exclude: Option<&UserId>,
    ) -> Vec<UserId> {
        let event = ServerEvent::NewMessage {
            conversation_id: conversation_id.as_str().to_string(),
            message_id: message_id.map(MessageId::into_string),
            message,
            timestamp: timestamp_to_rfc3339(now_utc_millis()),
        };
        self.broadcast_event(conversation_id, exclude, &event).await
    }

    /// 既読を在室者へ通知する（既読にした本人は除外）
    pub async fn notify_message_read(
        &self,
        conversation_id: &ConversationId,
        message_id: Option<MessageId>,
        read_by: &UserId,
    ) -> Vec<UserId> {
        let event = ServerEvent::MessageRead {
            conversation_id: conversation_id.as_str().to_string(),
            message_id: message_id.map(MessageId::into_string),
            read_by: read_by.as_str().to_string(),
            timestamp: timestamp_to_rfc3339(now_utc_millis()),
        };
        self.broadcast_event(conversation_id, Some(read_by), &event)
            .await
    }

    /// リアクション追加を在室者へ通知する（リアクションした本人は除外）
    pub async fn notify_reaction_added(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        reaction: String,
        user_id: &UserId,
    ) -> Vec<UserId> {
        let event = ServerEvent::ReactionAdded {
            conversation_id: conversation_id.as_str().to_string(),
            message_id: message_id.into_string(),
            reaction,
            user_id: user_id.as_str().to_string(),
            timestamp: timestamp_to_rfc3339(now_utc_millis()),
        };
        self.broadcast_event(conversation_id, Some(user_id), &event)
            .await
    }
}
