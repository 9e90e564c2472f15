//! InMemory ルーム在室インデックス実装
//!
//! ドメイン層が定義する `MembershipIndex` trait の具体的な実装。
//! 会話 ID → 在室ユーザー集合のマップを保持します。派生状態であり、
//! 永続化はしません（接続が全て切れれば空になる）。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConversationId, MembershipIndex, UserId};

/// インメモリ在室インデックス実装
pub struct InMemoryMembershipIndex {
    rooms: Mutex<HashMap<ConversationId, HashSet<UserId>>>,
}

impl InMemoryMembershipIndex {
    /// 新しい InMemoryMembershipIndex を作成
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMembershipIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MembershipIndex for InMemoryMembershipIndex {
    async fn add_member(&self, conversation_id: ConversationId, user_id: UserId) {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
    }

    async fn remove_member(&self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(members) = rooms.get_mut(conversation_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        // 誰もいなくなったルームのエントリは残さない
        if members.is_empty() {
            rooms.remove(conversation_id);
        }
        removed
    }

    async fn members_of(&self, conversation_id: &ConversationId) -> Vec<UserId> {
        let rooms = self.rooms.lock().await;
        let mut members: Vec<UserId> = rooms
            .get(conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        // Sort by user_id for consistent ordering
        members.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        members
    }
}
