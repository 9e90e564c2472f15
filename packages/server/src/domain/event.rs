//! 接続へ配信するイベントの定義
//!
//! イベントは一時的なもので、保存されずに中継されるだけです。ワイヤ上では
//! `type` フィールドでタグ付けされたフラットな JSON オブジェクトになり、
//! すべてのバリアントが RFC 3339 の `timestamp` を持ちます。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// アウトバウンドイベント
///
/// フィールド名はワイヤ上では camelCase（ブラウザクライアントとの互換性のため）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 接続直後の到達確認
    #[serde(rename_all = "camelCase")]
    Connection { status: String, timestamp: String },

    /// 認証完了の応答
    #[serde(rename_all = "camelCase")]
    Authenticated { user_id: String, timestamp: String },

    /// 入室完了の応答（本人宛て）
    #[serde(rename_all = "camelCase")]
    ConversationJoined {
        conversation_id: String,
        timestamp: String,
    },

    /// 他の参加者が入室した通知
    #[serde(rename_all = "camelCase")]
    UserJoinedConversation {
        user_id: String,
        conversation_id: String,
        timestamp: String,
    },

    /// 他の参加者が退出した通知
    #[serde(rename_all = "camelCase")]
    UserLeftConversation {
        user_id: String,
        conversation_id: String,
        timestamp: String,
    },

    /// 入力中インジケーターの開始通知
    #[serde(rename_all = "camelCase")]
    TypingStart {
        user_id: String,
        conversation_id: String,
        timestamp: String,
    },

    /// 入力中インジケーターの停止通知
    #[serde(rename_all = "camelCase")]
    TypingStop {
        user_id: String,
        conversation_id: String,
        timestamp: String,
    },

    /// 新着メッセージの通知
    #[serde(rename_all = "camelCase")]
    NewMessage {
        conversation_id: String,
        message_id: Option<String>,
        message: Value,
        timestamp: String,
    },

    /// 既読の通知
    #[serde(rename_all = "camelCase")]
    MessageRead {
        conversation_id: String,
        message_id: Option<String>,
        read_by: String,
        timestamp: String,
    },

    /// リアクション追加の通知
    #[serde(rename_all = "camelCase")]
    ReactionAdded {
        conversation_id: String,
        message_id: String,
        reaction: String,
        user_id: String,
        timestamp: String,
    },

    /// heartbeat への応答
    #[serde(rename_all = "camelCase")]
    HeartbeatAck { timestamp: String },

    /// プロトコル・認可エラーの通知（接続は維持される）
    #[serde(rename_all = "camelCase")]
    Error { message: String, timestamp: String },
}

impl ServerEvent {
    /// ワイヤ形式（JSON 文字列）へシリアライズする
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerEvent serialization must not fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_connection_event() {
        // テスト項目: connection イベントが期待するワイヤ形式になる
        // given (前提条件):
        let event = ServerEvent::Connection {
            status: "connected".to_string(),
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };

        // when (操作):
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "connection");
        assert_eq!(json["status"], "connected");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_serialize_typing_start_uses_camel_case_fields() {
        // テスト項目: typing_start イベントのフィールドが camelCase になる
        // given (前提条件):
        let event = ServerEvent::TypingStart {
            user_id: "alice".to_string(),
            conversation_id: "c-7".to_string(),
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };

        // when (操作):
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "typing_start");
        assert_eq!(json["userId"], "alice");
        assert_eq!(json["conversationId"], "c-7");
    }

    #[test]
    fn test_serialize_message_read_with_missing_message_id() {
        // テスト項目: messageId が無い既読通知は null として送られる
        // given (前提条件):
        let event = ServerEvent::MessageRead {
            conversation_id: "c-7".to_string(),
            message_id: None,
            read_by: "bob".to_string(),
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };

        // when (操作):
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "message_read");
        assert!(json["messageId"].is_null());
        assert_eq!(json["readBy"], "bob");
    }

    #[test]
    fn test_serialize_heartbeat_ack() {
        // テスト項目: heartbeat_ack イベントのタグ名が正しい
        // given (前提条件):
        let event = ServerEvent::HeartbeatAck {
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };

        // when (操作):
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "heartbeat_ack");
    }

    #[test]
    fn test_serialize_new_message_preserves_payload() {
        // テスト項目: new_message イベントがメッセージ本体をそのまま運ぶ
        // given (前提条件):
        let event = ServerEvent::NewMessage {
            conversation_id: "c-7".to_string(),
            message_id: Some("m-1".to_string()),
            message: serde_json::json!({"content": "hello", "senderId": "alice"}),
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };

        // when (操作):
        let json: Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["messageId"], "m-1");
        assert_eq!(json["message"]["content"], "hello");
    }
}
