//! InMemory 会話ストア実装
//!
//! ドメイン層が定義する `ConversationStore` trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! ## 技術的負債
//!
//! 本番では会話の正本は外部の HTTP 層が持つ conversations テーブルです。
//! この実装は単体起動・テスト用のスタンドインで、DBMS 実装を追加する際は
//! 同じ trait を SQL の `WHERE id = $1 AND (buyer_id = $2 OR seller_id = $2)`
//! 相当の問い合わせで実装します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ConversationId, ConversationParticipants, ConversationStore, RepositoryError, UserId,
};

/// インメモリ会話ストア実装
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, ConversationParticipants>>,
}

impl InMemoryConversationStore {
    /// 新しい InMemoryConversationStore を作成
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// 会話を登録する（シード・テスト用）
    pub async fn insert(
        &self,
        conversation_id: ConversationId,
        participants: ConversationParticipants,
    ) {
        let mut conversations = self.conversations.lock().await;
        conversations.insert(conversation_id, participants);
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn is_participant(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<bool, RepositoryError> {
        let conversations = self.conversations.lock().await;
        Ok(conversations
            .get(conversation_id)
            .map(|participants| participants.is_participant(user_id))
            .unwrap_or(false))
    }
}
