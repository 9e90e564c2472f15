//! InMemory 入力中インジケーターストア実装
//!
//! ドメイン層が定義する `TypingStore` trait の具体的な実装。
//! (会話, ユーザー) → レコードのマップを保持します。
//!
//! ## 技術的負債
//!
//! 本番では typing_indicators テーブルへのミラーが正本の読み取りパスに
//! なります（アクティブな接続を持たないページロード用）。DBMS 実装を
//! 追加する際は upsert（`ON CONFLICT ... DO UPDATE`）相当で実装します。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use shoudan_shared::time::Clock;

use crate::domain::{
    ConversationId, RepositoryError, Timestamp, TypingRecord, TypingStore, UserId,
    TYPING_FRESH_WINDOW, TYPING_PURGE_AFTER,
};

/// インメモリ入力中インジケーターストア実装
///
/// 時刻は注入された [`Clock`] から取得します（TTL 動作のテスト容易性のため）。
pub struct InMemoryTypingStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<(ConversationId, UserId), TypingRecord>>,
}

impl InMemoryTypingStore {
    /// 新しい InMemoryTypingStore を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TypingStore for InMemoryTypingStore {
    async fn set_typing(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    ) -> Result<TypingRecord, RepositoryError> {
        let record = TypingRecord {
            conversation_id: conversation_id.clone(),
            user_id: user_id.clone(),
            is_typing,
            last_activity: Timestamp::new(self.clock.now_millis()),
        };

        let mut entries = self.entries.lock().await;
        entries.insert((conversation_id, user_id), record.clone());
        Ok(record)
    }

    async fn typing_users(
        &self,
        conversation_id: &ConversationId,
        exclude: Option<&UserId>,
    ) -> Result<Vec<TypingRecord>, RepositoryError> {
        let now = self.clock.now_millis();
        let fresh_millis = TYPING_FRESH_WINDOW.as_millis() as i64;

        let entries = self.entries.lock().await;
        let mut records: Vec<TypingRecord> = entries
            .values()
            .filter(|record| {
                &record.conversation_id == conversation_id
                    && record.is_typing
                    && now - record.last_activity.value() <= fresh_millis
                    && exclude != Some(&record.user_id)
            })
            .cloned()
            .collect();

        // 直近の活動が新しい順
        records.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(records)
    }

    async fn cleanup(&self) -> Result<usize, RepositoryError> {
        let now = self.clock.now_millis();
        let purge_millis = TYPING_PURGE_AFTER.as_millis() as i64;

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, record| now - record.last_activity.value() <= purge_millis);
        Ok(before - entries.len())
    }
}
