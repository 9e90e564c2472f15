//! 接続レジストリ・ルーム在室インデックス・イベント配信の trait 定義
//!
//! ドメイン層が必要とするインターフェースをドメイン層自身が定義し、
//! Infrastructure 層が具体的な実装を提供します（依存性の逆転）。
//! ここで扱う状態はすべてプロセス内メモリ上の一時的なもので、永続化されません。

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::error::PushError;
use super::value_object::{ConnectionId, ConversationId, Timestamp, UserId};

/// 接続へのアウトバウンド送信チャンネル
///
/// 受信側は接続ごとの pusher タスクが持ち、FIFO で WebSocket へ流します。
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// レジストリに登録される、生きている接続 1 本分のハンドル
///
/// `close` の送信側はレジストリのエントリと共に生存します。エントリが
/// 削除（置き換え・強制退去）されて送信側が drop されると、ソケットタスク側の
/// 受信側がチャンネルの閉鎖を観測して接続を終了します。
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub sender: PusherChannel,
    pub close: watch::Sender<()>,
    pub connected_at: Timestamp,
    pub last_heartbeat: Timestamp,
}

/// 接続レジストリ
///
/// ユーザー 1 人につき生きている接続エントリは最大 1 つ。新しい登録は
/// 既存のエントリを置き換えます（last-writer-wins）。置き換えは旧接続の
/// ルーム退出を暗黙には行いません。その後始末は旧接続が閉じるときの
/// クリーンアップパスの責務です。
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 接続を登録する。置き換えられた旧ハンドルがあればそれを返す
    async fn register(&self, user_id: UserId, handle: ConnectionHandle)
    -> Option<ConnectionHandle>;

    /// 接続を登録解除する
    ///
    /// `connection_id` が現在のエントリと一致する場合のみ削除します
    /// （置き換え済みの旧接続が後継のエントリを消さないようにするため）。
    async fn unregister(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool;

    /// ユーザーの送信チャンネルを取得する
    async fn sender_of(&self, user_id: &UserId) -> Option<PusherChannel>;

    /// last-heartbeat を更新する。エントリが存在すれば true
    async fn touch_heartbeat(&self, user_id: &UserId, at: Timestamp) -> bool;

    /// 接続中の全ユーザー ID を取得する（診断用）
    async fn connected_users(&self) -> Vec<UserId>;

    /// heartbeat が `timeout` より古い接続を強制退去し、そのユーザー ID を返す
    ///
    /// エントリの削除によってハンドルが drop され、ソケットタスク側で
    /// 通常の切断クリーンアップが走ります。冪等であること。
    async fn evict_stale(&self, now: Timestamp, timeout: Duration) -> Vec<UserId>;
}

/// ルーム在室インデックス
///
/// 会話 ID → 現在オンラインで入室中のユーザー集合。会話レコードそのものでは
/// ない点に注意（このマップに無い会話も存在し得る。誰も入室していないだけ）。
#[async_trait]
pub trait MembershipIndex: Send + Sync {
    /// ユーザーをルームに追加する
    async fn add_member(&self, conversation_id: ConversationId, user_id: UserId);

    /// ユーザーをルームから削除する。実際に削除された場合 true
    async fn remove_member(&self, conversation_id: &ConversationId, user_id: &UserId) -> bool;

    /// ルームの在室者一覧を取得する（user id でソート済み）
    async fn members_of(&self, conversation_id: &ConversationId) -> Vec<UserId>;
}

/// イベント配信（通知）の抽象化
#[async_trait]
pub trait EventPusher: Send + Sync {
    /// 特定のユーザーへ配信する
    async fn push_to(&self, user_id: &UserId, content: &str) -> Result<(), PushError>;

    /// 複数のユーザーへ配信する
    ///
    /// 配信は at-most-once・ベストエフォート。一部の宛先が既に切断していても
    /// 失敗扱いにはせず、スキップしてログに残すだけです。
    async fn broadcast(&self, targets: Vec<UserId>, content: &str) -> Result<(), PushError>;
}
