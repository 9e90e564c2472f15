//! UseCase: 接続切断処理（レジストリからの登録解除）
//!
//! ルーム退出と入力中停止は `LeaveConversationUseCase` が担うため、ここでは
//! レジストリのエントリ削除のみを行います。ソケットのクリーンアップパスは
//! 「在室していれば退出 → 登録解除」の順で両方を呼びます。

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRegistry, UserId};

/// 接続切断のユースケース
pub struct DisconnectUseCase {
    /// ConnectionRegistry（接続台帳の抽象化）
    registry: Arc<dyn ConnectionRegistry>,
}

impl DisconnectUseCase {
    /// 新しい DisconnectUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 切断を実行
    ///
    /// `connection_id` が現在のエントリと一致する場合のみ登録解除します。
    /// 置き換え済みの旧接続や強制退去済みの接続ではエントリが既に無い、
    /// または別の接続のものになっているため no-op です（冪等性）。
    ///
    /// # Returns
    ///
    /// エントリが実際に削除された場合 true
    pub async fn execute(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let removed = self.registry.unregister(user_id, connection_id).await;
        if removed {
            tracing::info!(
                "User '{}' disconnected and removed from registry",
                user_id.as_str()
            );
        } else {
            tracing::debug!(
                "Disconnect for user '{}' was a no-op (already evicted or replaced)",
                user_id.as_str()
            );
        }
        removed
    }
}
