//! ドメイン層の値オブジェクト
//!
//! 外部から受け取った生の文字列は、ここで検証してから値オブジェクトとして
//! 扱います。検証済みであることを型で保証するのが目的です。

use uuid::Uuid;

use super::error::ValidationError;

/// 識別子として許容する最大長
const MAX_ID_LEN: usize = 128;

fn validate_id(what: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(what));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong(what, MAX_ID_LEN));
    }
    Ok(())
}

/// 認証済み参加者の識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        validate_id("user id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 会話（買い手と売り手の二者間チャット）の識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        validate_id("conversation id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 永続化済みメッセージの識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        validate_id("message id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 1 本の WebSocket 接続の識別子
///
/// 同一ユーザーが再接続した場合に新旧の接続を区別するために使います
/// （last-writer-wins の置き換え判定に必要）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// 新しい接続 ID を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Unix タイムスタンプ（UTC、ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
