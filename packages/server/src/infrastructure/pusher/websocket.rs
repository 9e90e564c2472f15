//! WebSocket を使った EventPusher 実装
//!
//! ## 責務
//!
//! - 接続レジストリから宛先の送信チャンネルを引き、イベントを送信する
//!   （push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成・登録は UI 層（`src/ui/handler/websocket.rs`）が行います。
//! この実装は配信だけを担い、チャンネルの台帳はレジストリに一本化されます：
//! - UI 層: WebSocket 接続の受付、sender の生成・登録
//! - Infrastructure 層: レジストリ参照によるイベント送信

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConnectionRegistry, EventPusher, PushError, UserId};

/// WebSocket を使った EventPusher 実装
pub struct WebSocketEventPusher {
    /// 接続レジストリ（宛先チャンネルの台帳）
    registry: Arc<dyn ConnectionRegistry>,
}

impl WebSocketEventPusher {
    /// 新しい WebSocketEventPusher を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventPusher for WebSocketEventPusher {
    async fn push_to(&self, user_id: &UserId, content: &str) -> Result<(), PushError> {
        match self.registry.sender_of(user_id).await {
            Some(sender) => {
                sender
                    .send(content.to_string())
                    .map_err(|e| PushError::PushFailed(e.to_string()))?;
                tracing::debug!("Pushed event to user '{}'", user_id.as_str());
                Ok(())
            }
            None => Err(PushError::ClientNotFound(user_id.as_str().to_string())),
        }
    }

    async fn broadcast(&self, targets: Vec<UserId>, content: &str) -> Result<(), PushError> {
        for target in targets {
            match self.registry.sender_of(&target).await {
                Some(sender) => {
                    // ブロードキャストでは一部の送信失敗を許容
                    if let Err(e) = sender.send(content.to_string()) {
                        tracing::warn!(
                            "Failed to push event to user '{}': {}",
                            target.as_str(),
                            e
                        );
                    } else {
                        tracing::debug!("Broadcasted event to user '{}'", target.as_str());
                    }
                }
                None => {
                    tracing::warn!(
                        "User '{}' not connected during broadcast, skipping",
                        target.as_str()
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionHandle, ConnectionId, Timestamp};
    use crate::infrastructure::registry::InMemoryConnectionRegistry;
    use tokio::sync::{mpsc, watch};

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    async fn register(
        registry: &InMemoryConnectionRegistry,
        id: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, _close_rx) = watch::channel(());
        registry
            .register(
                user(id),
                ConnectionHandle {
                    connection_id: ConnectionId::generate(),
                    sender: tx,
                    close: close_tx,
                    connected_at: Timestamp::new(0),
                    last_heartbeat: Timestamp::new(0),
                },
            )
            .await;
        rx
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 接続中のユーザーへイベントを送信できる
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let mut rx = register(&registry, "alice").await;
        let pusher = WebSocketEventPusher::new(registry);

        // when (操作):
        let result = pusher.push_to(&user("alice"), "Hello").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_client_not_found() {
        // テスト項目: 未接続ユーザーへの送信はエラーを返す
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let pusher = WebSocketEventPusher::new(registry);

        // when (操作):
        let result = pusher.push_to(&user("nonexistent"), "Hello").await;

        // then (期待する結果):
        assert!(matches!(result, Err(PushError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_broadcast_success() {
        // テスト項目: 複数のユーザーへイベントをブロードキャストできる
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let mut rx1 = register(&registry, "alice").await;
        let mut rx2 = register(&registry, "bob").await;
        let pusher = WebSocketEventPusher::new(registry);

        // when (操作):
        let result = pusher
            .broadcast(vec![user("alice"), user("bob")], "Broadcast event")
            .await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx1.recv().await, Some("Broadcast event".to_string()));
        assert_eq!(rx2.recv().await, Some("Broadcast event".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_partial_failure() {
        // テスト項目: ブロードキャスト時、一部の宛先が未接続でも成功する
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let mut rx1 = register(&registry, "alice").await;
        let pusher = WebSocketEventPusher::new(registry);

        // when (操作):
        let result = pusher
            .broadcast(vec![user("alice"), user("nonexistent")], "Broadcast event")
            .await;

        // then (期待する結果): ブロードキャストは部分失敗を許容
        assert!(result.is_ok());
        assert_eq!(rx1.recv().await, Some("Broadcast event".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_empty_targets() {
        // テスト項目: 空のターゲットリストでもエラーにならない
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let pusher = WebSocketEventPusher::new(registry);

        // when (操作):
        let result = pusher.broadcast(vec![], "Event").await;

        // then (期待する結果):
        assert!(result.is_ok());
    }
}
