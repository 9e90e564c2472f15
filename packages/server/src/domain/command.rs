//! クライアントから受信するコマンドの定義
//!
//! ワイヤ上のフレームは `{"type": "...", "data": {...}}` という形です。
//! 文字列比較で分岐するのではなく、閉じた enum として定義して網羅的に
//! マッチします（コマンドの追加・監査がコンパイル時に検査される）。

use serde::Deserialize;
use serde_json::Value;

/// インバウンドコマンド
///
/// `type` がコマンド名、`data` がペイロードです。フィールド名はワイヤ上では
/// camelCase（ブラウザクライアントとの互換性のため）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// 接続をユーザーに紐付ける。唯一、未認証状態で受け付けるコマンド
    #[serde(rename_all = "camelCase")]
    Authenticate {
        user_id: String,
        /// セッション検証は外部のセッション層が担う。ここでは受け取るだけ
        #[serde(default)]
        session_id: Option<String>,
    },

    /// 会話ルームへの入室（認可チェックあり）
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: String },

    /// 現在の会話ルームからの退出
    LeaveConversation {},

    /// 入力中インジケーターの開始
    TypingStart {},

    /// 入力中インジケーターの停止
    TypingStop {},

    /// 外部 HTTP 層で永続化済みのメッセージを他の参加者へ中継する
    #[serde(rename_all = "camelCase")]
    MessageSent {
        conversation_id: String,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        message_data: Value,
    },

    /// 既読通知の中継
    #[serde(rename_all = "camelCase")]
    MessageRead {
        conversation_id: String,
        #[serde(default)]
        message_id: Option<String>,
    },

    /// 生存確認。接続の last-heartbeat を更新する
    Heartbeat {},
}

impl ClientCommand {
    /// 受信テキストを 1 つのコマンドとして解釈する
    ///
    /// ペイロードを持たないコマンドではクライアントが `data` を省略（または
    /// null を送信）することがあるため、空オブジェクトに正規化してから
    /// デシリアライズします。
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Value = serde_json::from_str(text)?;
        if let Some(object) = frame.as_object_mut() {
            let data = object
                .entry("data")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if data.is_null() {
                *data = Value::Object(serde_json::Map::new());
            }
        }
        serde_json::from_value(frame)
    }
}
