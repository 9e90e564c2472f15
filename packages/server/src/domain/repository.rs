//! 永続化コラボレーターの trait 定義
//!
//! ハブが外部の永続化層（会話テーブル・入力中インジケーターのミラー）に
//! 触れるのはこの 2 つの trait 経由のみです。具体的な実装は Infrastructure
//! 層が提供します（依存性の逆転）。

use std::time::Duration;

use async_trait::async_trait;

use super::entity::TypingRecord;
use super::error::RepositoryError;
use super::value_object::{ConversationId, UserId};

/// 「入力中」として表示する鮮度の上限
///
/// これより古い活動しかないレコードは読み取りパスで除外されます。
pub const TYPING_FRESH_WINDOW: Duration = Duration::from_secs(10);

/// 入力中レコードを完全に破棄するまでの期間（掃除タスクが使用）
pub const TYPING_PURGE_AFTER: Duration = Duration::from_secs(30);

/// 会話ストア（入室認可の照会先）
///
/// 会話の CRUD は外部の HTTP 層が担うため、ハブに必要なのは
/// 「このユーザーはこの会話の当事者（買い手または売り手）か」だけです。
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 指定ユーザーが会話の当事者かどうかを照会する
    ///
    /// 会話が存在しない場合は `Ok(false)`。ストア障害は `Err` で返し、
    /// 呼び出し側がアクセス拒否として扱います。
    async fn is_participant(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<bool, RepositoryError>;
}

/// 入力中インジケーターのストア（永続ミラー）
///
/// ライブ配信の判断はメモリ上の状態が権威を持ちますが、アクティブな接続を
/// 持たないページロードでも表示できるよう、永続ストアにミラーされます。
#[async_trait]
pub trait TypingStore: Send + Sync {
    /// (会話, ユーザー) の入力中フラグを upsert し、更新後のレコードを返す
    ///
    /// ブロードキャストは行いません。呼び出し側が返ってきたレコードを
    /// 基にイベントを配信します。
    async fn set_typing(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    ) -> Result<TypingRecord, RepositoryError>;

    /// 鮮度内（[`TYPING_FRESH_WINDOW`]）で入力中のユーザーを取得する
    ///
    /// `exclude` には通常リクエスト元のユーザーを渡します。
    /// 結果は last_activity の降順です。
    async fn typing_users(
        &self,
        conversation_id: &ConversationId,
        exclude: Option<&UserId>,
    ) -> Result<Vec<TypingRecord>, RepositoryError>;

    /// [`TYPING_PURGE_AFTER`] より古いレコードを削除し、削除件数を返す
    ///
    /// ハンドラからは呼ばれません。掃除タスク専用です。
    async fn cleanup(&self) -> Result<usize, RepositoryError>;
}
