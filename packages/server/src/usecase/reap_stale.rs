//! UseCase: 生存監視（heartbeat タイムアウトによる強制退去）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ReapStaleConnectionsUseCase::execute() メソッド
//! - heartbeat が途絶えた接続の強制退去
//!
//! ### なぜこのテストが必要か
//! - 「切断済みユーザーが在室し続けない」という不変条件の片翼
//! - 強制退去の冪等性（二重退去が no-op であること）の保証
//! - heartbeat 更新済みの接続が誤って退去されないことの確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：タイムアウトした接続のみの退去
//! - エッジケース：全接続が健在、同一条件での再実行

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ConnectionRegistry, Timestamp, UserId};

/// 生存監視のユースケース
///
/// 一定周期で呼ばれ、`timeout` より長く heartbeat の無い接続をレジストリから
/// 強制退去します。エントリの削除でハンドルが drop され、ソケットタスク側の
/// クリーンアップ（ルーム退出・入力中停止・退出通知）が通常の切断と同じ
/// パスで走ります。
pub struct ReapStaleConnectionsUseCase {
    /// ConnectionRegistry（接続台帳の抽象化）
    registry: Arc<dyn ConnectionRegistry>,
}

impl ReapStaleConnectionsUseCase {
    /// 新しい ReapStaleConnectionsUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 強制退去を実行
    ///
    /// # Arguments
    ///
    /// * `now` - 現在時刻（呼び出し側の clock から渡す）
    /// * `timeout` - 許容する heartbeat の無音時間
    ///
    /// # Returns
    ///
    /// 退去したユーザー ID リスト。冪等（退去済みの接続は対象外）
    pub async fn execute(&self, now: Timestamp, timeout: Duration) -> Vec<UserId> {
        let evicted = self.registry.evict_stale(now, timeout).await;
        if !evicted.is_empty() {
            tracing::info!("Liveness sweep evicted {} stale connection(s)", evicted.len());
        }
        evicted
    }
}
