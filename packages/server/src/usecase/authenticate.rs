//! UseCase: 接続の認証（レジストリ登録）

use std::sync::Arc;

use crate::domain::{ConnectionHandle, ConnectionRegistry, Timestamp, UserId};

/// 接続認証のユースケース
///
/// セッショントークンの検証は外部のセッション層が担うため、ここでの認証は
/// 「接続をユーザー ID に紐付けてレジストリに登録する」ことを指します。
/// 同一ユーザーの既存セッションは置き換えられます（last-writer-wins）。
pub struct AuthenticateUseCase {
    /// ConnectionRegistry（接続台帳の抽象化）
    registry: Arc<dyn ConnectionRegistry>,
}

impl AuthenticateUseCase {
    /// 新しい AuthenticateUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続認証を実行
    ///
    /// # Arguments
    ///
    /// * `user_id` - 認証するユーザーの ID（Domain Model）
    /// * `handle` - 接続ハンドル（送信チャンネル・close シグナルを含む）
    ///
    /// # Returns
    ///
    /// 接続時刻。置き換えられた旧接続があればここで drop され、その close
    /// チャンネルの閉鎖によって旧ソケットが終了します（旧接続のルーム退出は
    /// 旧ソケット側のクリーンアップパスが行う）。
    pub async fn execute(&self, user_id: UserId, handle: ConnectionHandle) -> Timestamp {
        let connected_at = handle.connected_at;

        if let Some(replaced) = self.registry.register(user_id.clone(), handle).await {
            tracing::info!(
                "User '{}' opened a new session, closing the previous one",
                user_id.as_str()
            );
            drop(replaced);
        }

        connected_at
    }
}
