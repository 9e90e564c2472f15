//! Periodic maintenance tasks.
//!
//! Two independently scheduled sweeps that share only the clock: the liveness
//! sweep (heartbeat-timeout eviction) and the typing-indicator purge. Keeping
//! them separate means a failure or slowdown in one never backs up the other.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use shoudan_shared::time::now_utc_millis;

use crate::domain::Timestamp;
use crate::usecase::{ReapStaleConnectionsUseCase, SetTypingUseCase};

/// Spawn the liveness sweep.
///
/// Every `sweep_interval`, connections whose last heartbeat is older than
/// `heartbeat_timeout` are evicted from the registry. The eviction drops the
/// registry handle, which force-closes the socket and runs the normal
/// disconnect cleanup (room leave, typing stop, user-left broadcast).
pub fn spawn_liveness_sweeper(
    usecase: Arc<ReapStaleConnectionsUseCase>,
    sweep_interval: Duration,
    heartbeat_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Timestamp::new(now_utc_millis());
            usecase.execute(now, heartbeat_timeout).await;
        }
    })
}

/// Spawn the typing-indicator purge.
///
/// Every `sweep_interval`, typing records older than the purge window are
/// deleted from the mirror. Failures are logged and retried on the next tick.
pub fn spawn_typing_sweeper(
    usecase: Arc<SetTypingUseCase>,
    sweep_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match usecase.cleanup().await {
                Ok(purged) if purged > 0 => {
                    tracing::debug!("Purged {} stale typing indicator(s)", purged);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Failed to clean up typing indicators: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ConnectionHandle, ConnectionId, ConnectionRegistry, Timestamp, UserId,
    };
    use crate::infrastructure::registry::InMemoryConnectionRegistry;
    use tokio::sync::{mpsc, watch};

    #[tokio::test]
    async fn test_liveness_sweeper_evicts_stale_connection() {
        // テスト項目: 掃除タスクが周期的に走り、無音の接続を退去させる
        // given (前提条件): heartbeat が過去に固定された接続
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let (close_tx, _close_rx) = watch::channel(());
        registry
            .register(
                UserId::new("alice".to_string()).unwrap(),
                ConnectionHandle {
                    connection_id: ConnectionId::generate(),
                    sender: tx,
                    close: close_tx,
                    connected_at: Timestamp::new(0),
                    last_heartbeat: Timestamp::new(0),
                },
            )
            .await;
        let usecase = Arc::new(ReapStaleConnectionsUseCase::new(registry.clone()));

        // when (操作): 短い周期・短いタイムアウトで掃除タスクを動かす
        let sweeper = spawn_liveness_sweeper(
            usecase,
            Duration::from_millis(20),
            Duration::from_millis(1),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        // then (期待する結果): 接続が退去されている
        assert!(registry.connected_users().await.is_empty());
    }
}
