//! UseCase: 入力中インジケーター処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SetTypingUseCase::execute() メソッド
//! - 入力中状態の upsert とブロードキャスト対象選定
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：本人以外の在室者だけが通知対象になる
//! - ミラーへの書き込み失敗時にブロードキャストしない（呼び出し側契約）
//! - ライブ配信と独立した読み取りパス（typing_users）の保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：入力開始・停止の upsert と通知対象選定
//! - 異常系：ミラーの書き込み失敗
//! - エッジケース：本人しか在室していない場合（通知対象なし）

use std::sync::Arc;

use crate::domain::{
    ConversationId, EventPusher, MembershipIndex, RepositoryError, TypingRecord, TypingStore,
    UserId,
};

/// 入力中インジケーターのユースケース
pub struct SetTypingUseCase {
    /// TypingStore（入力中インジケーターの抽象化）
    typing_store: Arc<dyn TypingStore>,
    /// MembershipIndex（在室インデックスの抽象化）
    membership: Arc<dyn MembershipIndex>,
    /// EventPusher（イベント配信の抽象化）
    pusher: Arc<dyn EventPusher>,
}

impl SetTypingUseCase {
    /// 新しい SetTypingUseCase を作成
    pub fn new(
        typing_store: Arc<dyn TypingStore>,
        membership: Arc<dyn MembershipIndex>,
        pusher: Arc<dyn EventPusher>,
    ) -> Self {
        Self {
            typing_store,
            membership,
            pusher,
        }
    }

    /// 入力中状態の更新を実行
    ///
    /// ミラーへの upsert と通知対象の選定のみを行い、ブロードキャストは
    /// しません（呼び出し側が返ってきたレコードからイベントを組み立てる）。
    ///
    /// # Arguments
    ///
    /// * `conversation_id` - 対象の会話 ID（Domain Model）
    /// * `user_id` - 入力中のユーザー ID（Domain Model）
    /// * `is_typing` - 入力中かどうか
    ///
    /// # Returns
    ///
    /// * `Ok((TypingRecord, Vec<UserId>))` - 更新後のレコードと通知対象
    /// * `Err(RepositoryError)` - ミラーへの書き込み失敗。状態は変化しない
    pub async fn execute(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        is_typing: bool,
    ) -> Result<(TypingRecord, Vec<UserId>), RepositoryError> {
        let record = self
            .typing_store
            .set_typing(conversation_id.clone(), user_id.clone(), is_typing)
            .await?;

        let targets: Vec<UserId> = self
            .membership
            .members_of(conversation_id)
            .await
            .into_iter()
            .filter(|id| id != user_id)
            .collect();

        Ok((record, targets))
    }

    /// 鮮度内で入力中のユーザーを取得（ライブ配信と独立した読み取りパス）
    ///
    /// アクティブな接続を持たないページロードが「○○ が入力中…」を表示する
    /// ために使います。`exclude` には通常リクエスト元のユーザーを渡します。
    pub async fn typing_users(
        &self,
        conversation_id: &ConversationId,
        exclude: Option<&UserId>,
    ) -> Result<Vec<TypingRecord>, RepositoryError> {
        self.typing_store.typing_users(conversation_id, exclude).await
    }

    /// 古いレコードの破棄（掃除タスク専用）
    pub async fn cleanup(&self) -> Result<usize, RepositoryError> {
        self.typing_store.cleanup().await
    }

    /// 入力中イベントを在室者にブロードキャスト
    ///
    /// # Arguments
    ///
    /// * `targets` - ブロードキャスト対象のユーザー ID リスト（Domain Model）
    /// * `message` - ブロードキャストするメッセージ（JSON）
    pub async fn broadcast_typing(
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
