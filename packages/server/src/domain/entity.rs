//! ドメイン層のエンティティ
//!
//! 接続 1 本ごとの状態機械（`Connection`）、会話の当事者
//! （`ConversationParticipants`）、入力中状態（`TypingRecord`）を定義します。

use super::error::TransitionError;
use super::value_object::{ConnectionId, ConversationId, Timestamp, UserId};

/// 接続の状態
///
/// `Unauthenticated → Authenticated → InConversation ⇄ Authenticated` と遷移し、
/// 切断はどの状態からでも起こり得ます（切断処理は ui 層のクリーンアップが担当）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// 接続直後。`authenticate` コマンドのみ受け付ける
    Unauthenticated,
    /// 認証済み。どの会話にも参加していない
    Authenticated { user_id: UserId },
    /// 認証済みで、1 つの会話に参加している（同時に参加できる会話は最大 1 つ）
    InConversation {
        user_id: UserId,
        conversation_id: ConversationId,
    },
}

/// 1 本の WebSocket 接続の状態機械
///
/// ソケットオブジェクトにアドホックにフィールドを生やすのではなく、
/// 遷移メソッド経由でのみ状態を変化させます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    phase: ConnectionPhase,
}

impl Connection {
    /// 未認証状態の新しい接続を作成
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: ConnectionPhase::Unauthenticated,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    /// 認証済みであればユーザー ID を返す
    pub fn user_id(&self) -> Option<&UserId> {
        match &self.phase {
            ConnectionPhase::Unauthenticated => None,
            ConnectionPhase::Authenticated { user_id } => Some(user_id),
            ConnectionPhase::InConversation { user_id, .. } => Some(user_id),
        }
    }

    /// 参加中の会話があればその ID を返す
    pub fn current_conversation(&self) -> Option<&ConversationId> {
        match &self.phase {
            ConnectionPhase::InConversation {
                conversation_id, ..
            } => Some(conversation_id),
            _ => None,
        }
    }

    /// 未認証 → 認証済み
    pub fn authenticate(&mut self, user_id: UserId) -> Result<(), TransitionError> {
        match self.phase {
            ConnectionPhase::Unauthenticated => {
                self.phase = ConnectionPhase::Authenticated { user_id };
                Ok(())
            }
            _ => Err(TransitionError::AlreadyAuthenticated),
        }
    }

    /// 認証済み → 会話参加中
    ///
    /// 別の会話に参加中の場合は先に `exit_conversation` で抜けておくこと
    /// （暗黙の退出はディスパッチャが担当します）。
    pub fn enter_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<(), TransitionError> {
        match &self.phase {
            ConnectionPhase::Authenticated { user_id } => {
                self.phase = ConnectionPhase::InConversation {
                    user_id: user_id.clone(),
                    conversation_id,
                };
                Ok(())
            }
            ConnectionPhase::InConversation { user_id, .. } => {
                self.phase = ConnectionPhase::InConversation {
                    user_id: user_id.clone(),
                    conversation_id,
                };
                Ok(())
            }
            ConnectionPhase::Unauthenticated => Err(TransitionError::NotAuthenticated),
        }
    }

    /// 会話参加中 → 認証済み。抜けた会話の ID を返す
    pub fn exit_conversation(&mut self) -> Result<ConversationId, TransitionError> {
        match &self.phase {
            ConnectionPhase::InConversation {
                user_id,
                conversation_id,
            } => {
                let left = conversation_id.clone();
                self.phase = ConnectionPhase::Authenticated {
                    user_id: user_id.clone(),
                };
                Ok(left)
            }
            _ => Err(TransitionError::NotInConversation),
        }
    }
}

/// 会話の当事者（買い手と売り手）
///
/// 会話ルームに入室できるのはこの 2 者のみです。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationParticipants {
    pub buyer_id: UserId,
    pub seller_id: UserId,
}

impl ConversationParticipants {
    pub fn new(buyer_id: UserId, seller_id: UserId) -> Self {
        Self {
            buyer_id,
            seller_id,
        }
    }

    /// 指定ユーザーが会話の当事者かどうか
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        &self.buyer_id == user_id || &self.seller_id == user_id
    }
}

/// 入力中インジケーターの 1 レコード
///
/// (会話, ユーザー) ごとに 1 件。`last_activity` が鮮度判定と掃除の基準になります。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingRecord {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub is_typing: bool,
    pub last_activity: Timestamp,
}
