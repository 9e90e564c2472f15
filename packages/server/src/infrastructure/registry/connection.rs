//! InMemory 接続レジストリ実装
//!
//! ドメイン層が定義する `ConnectionRegistry` trait の具体的な実装。
//! HashMap をインメモリの台帳として使用します。共有状態はこの Mutex 経由
//! でのみ触れること。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionHandle, ConnectionId, ConnectionRegistry, PusherChannel, Timestamp, UserId};

/// インメモリ接続レジストリ実装
///
/// Key: user_id / Value: 生きている接続のハンドル。
/// ユーザーごとにエントリは最大 1 つ（last-writer-wins）。
pub struct InMemoryConnectionRegistry {
    connections: Mutex<HashMap<UserId, ConnectionHandle>>,
}

impl InMemoryConnectionRegistry {
    /// 新しい InMemoryConnectionRegistry を作成
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(
        &self,
        user_id: UserId,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let mut connections = self.connections.lock().await;
        let replaced = connections.insert(user_id.clone(), handle);
        if replaced.is_some() {
            tracing::debug!(
                "User '{}' re-registered, previous connection will be closed",
                user_id.as_str()
            );
        } else {
            tracing::debug!("User '{}' registered to ConnectionRegistry", user_id.as_str());
        }
        replaced
    }

    async fn unregister(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(user_id) {
            Some(handle) if &handle.connection_id == connection_id => {
                connections.remove(user_id);
                tracing::debug!(
                    "User '{}' unregistered from ConnectionRegistry",
                    user_id.as_str()
                );
                true
            }
            // 置き換え済みの旧接続、または未登録。後継のエントリには触らない
            _ => false,
        }
    }

    async fn sender_of(&self, user_id: &UserId) -> Option<PusherChannel> {
        let connections = self.connections.lock().await;
        connections.get(user_id).map(|handle| handle.sender.clone())
    }

    async fn touch_heartbeat(&self, user_id: &UserId, at: Timestamp) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(user_id) {
            Some(handle) => {
                handle.last_heartbeat = at;
                true
            }
            None => false,
        }
    }

    async fn connected_users(&self) -> Vec<UserId> {
        let connections = self.connections.lock().await;
        let mut users: Vec<UserId> = connections.keys().cloned().collect();
        // Sort by user_id for consistent ordering
        users.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        users
    }

    async fn evict_stale(&self, now: Timestamp, timeout: Duration) -> Vec<UserId> {
        let timeout_millis = timeout.as_millis() as i64;
        let mut connections = self.connections.lock().await;

        let stale: Vec<UserId> = connections
            .iter()
            .filter(|(_, handle)| now.value() - handle.last_heartbeat.value() > timeout_millis)
            .map(|(user_id, _)| user_id.clone())
            .collect();

        for user_id in &stale {
            // エントリの drop で close チャンネルが閉じ、ソケットタスク側の
            // 切断クリーンアップ（ルーム退出・入力中停止）が走る
            connections.remove(user_id);
            tracing::info!(
                "Evicted stale connection for user '{}' (no heartbeat within timeout)",
                user_id.as_str()
            );
        }

        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, watch};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 登録・登録解除・heartbeat 更新・強制退去の基本動作
    // - last-writer-wins: 再登録で旧ハンドルが返されること
    // - 登録解除が connection_id で保護されていること
    //
    // 【なぜこのテストが必要か】
    // - レジストリは全ハンドラと掃除タスクが共有する中核状態
    // - 置き換え済みの旧接続が後継のエントリを消す事故を防ぐ必要がある
    // - 強制退去は掃除タスクから繰り返し呼ばれるため、冪等である必要がある
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn handle(at: i64) -> ConnectionHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (close_tx, _close_rx) = watch::channel(());
        ConnectionHandle {
            connection_id: ConnectionId::generate(),
            sender: tx,
            close: close_tx,
            connected_at: Timestamp::new(at),
            last_heartbeat: Timestamp::new(at),
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        // テスト項目: 登録した接続の送信チャンネルを取得できる
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();

        // when (操作):
        let replaced = registry.register(user("alice"), handle(1_000)).await;

        // then (期待する結果):
        assert!(replaced.is_none());
        assert!(registry.sender_of(&user("alice")).await.is_some());
        assert!(registry.sender_of(&user("bob")).await.is_none());
    }

    #[tokio::test]
    async fn test_register_replaces_existing_entry() {
        // テスト項目: 同一ユーザーの再登録で旧ハンドルが返される（last-writer-wins）
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let old = handle(1_000);
        let old_id = old.connection_id.clone();
        registry.register(user("alice"), old).await;

        // when (操作):
        let replaced = registry.register(user("alice"), handle(2_000)).await;

        // then (期待する結果): 旧ハンドルが返り、エントリは 1 つのまま
        assert!(replaced.is_some());
        assert_eq!(replaced.unwrap().connection_id, old_id);
        assert_eq!(registry.connected_users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_is_guarded_by_connection_id() {
        // テスト項目: 旧 connection_id での登録解除は後継のエントリを消さない
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let old = handle(1_000);
        let old_id = old.connection_id.clone();
        registry.register(user("alice"), old).await;
        let new = handle(2_000);
        let new_id = new.connection_id.clone();
        registry.register(user("alice"), new).await;

        // when (操作): 置き換え済みの旧接続が登録解除を試みる
        let removed_old = registry.unregister(&user("alice"), &old_id).await;

        // then (期待する結果): 後継のエントリは残る
        assert!(!removed_old);
        assert!(registry.sender_of(&user("alice")).await.is_some());

        // when (操作): 現行の connection_id で登録解除する
        let removed_new = registry.unregister(&user("alice"), &new_id).await;

        // then (期待する結果): エントリが削除される
        assert!(removed_new);
        assert!(registry.sender_of(&user("alice")).await.is_none());
    }

    #[tokio::test]
    async fn test_touch_heartbeat_updates_entry() {
        // テスト項目: heartbeat 更新でエントリが強制退去の対象外になる
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        registry.register(user("alice"), handle(1_000)).await;

        // when (操作): heartbeat を更新してから退去判定する
        assert!(registry.touch_heartbeat(&user("alice"), Timestamp::new(400_000)).await);
        let evicted = registry
            .evict_stale(Timestamp::new(500_000), Duration::from_secs(300))
            .await;

        // then (期待する結果): 更新済みの接続は退去されない
        assert!(evicted.is_empty());
    }

    #[tokio::test]
    async fn test_touch_heartbeat_for_unknown_user() {
        // テスト項目: 未登録ユーザーの heartbeat 更新は false を返す
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();

        // when (操作):
        let touched = registry.touch_heartbeat(&user("ghost"), Timestamp::new(1_000)).await;

        // then (期待する結果):
        assert!(!touched);
    }

    #[tokio::test]
    async fn test_evict_stale_removes_only_timed_out_connections() {
        // テスト項目: タイムアウトした接続だけが強制退去される
        // given (前提条件): alice は古く、bob は新しい
        let registry = InMemoryConnectionRegistry::new();
        registry.register(user("alice"), handle(0)).await;
        registry.register(user("bob"), handle(250_000)).await;

        // when (操作): now = 310 秒、タイムアウト 5 分で退去判定
        let evicted = registry
            .evict_stale(Timestamp::new(310_000), Duration::from_secs(300))
            .await;

        // then (期待する結果): alice のみ退去
        assert_eq!(evicted, vec![user("alice")]);
        assert!(registry.sender_of(&user("alice")).await.is_none());
        assert!(registry.sender_of(&user("bob")).await.is_some());
    }

    #[tokio::test]
    async fn test_evict_stale_is_idempotent() {
        // テスト項目: 既に退去済みの接続への再退去は no-op になる
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        registry.register(user("alice"), handle(0)).await;
        let first = registry
            .evict_stale(Timestamp::new(400_000), Duration::from_secs(300))
            .await;
        assert_eq!(first.len(), 1);

        // when (操作): 同じ条件でもう一度退去判定する
        let second = registry
            .evict_stale(Timestamp::new(400_000), Duration::from_secs(300))
            .await;

        // then (期待する結果): 何も起きない
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_evict_drops_close_channel() {
        // テスト項目: 強制退去でハンドルが drop され、close チャンネルが閉じる
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (close_tx, mut close_rx) = watch::channel(());
        let handle = ConnectionHandle {
            connection_id: ConnectionId::generate(),
            sender: tx,
            close: close_tx,
            connected_at: Timestamp::new(0),
            last_heartbeat: Timestamp::new(0),
        };
        registry.register(user("alice"), handle).await;

        // when (操作):
        registry
            .evict_stale(Timestamp::new(400_000), Duration::from_secs(300))
            .await;

        // then (期待する結果): 受信側が送信側の drop を観測する
        assert!(close_rx.changed().await.is_err());
    }

    #[tokio::test]
    async fn test_connected_users_is_sorted() {
        // テスト項目: 接続中ユーザー一覧が user_id でソートされている
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        registry.register(user("charlie"), handle(1_000)).await;
        registry.register(user("alice"), handle(1_000)).await;
        registry.register(user("bob"), handle(1_000)).await;

        // when (操作):
        let users = registry.connected_users().await;

        // then (期待する結果):
        assert_eq!(users, vec![user("alice"), user("bob"), user("charlie")]);
    }
}
