//! ドメイン層のエラー型定義

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be at most {1} characters")]
    TooLong(&'static str, usize),
}

/// 接続状態機械の遷移エラー
///
/// 接続の状態（未認証 → 認証済み ⇄ 会話参加中）は定義済みの遷移メソッド
/// 経由でのみ変化します。不正な遷移はこのエラーで拒否されます。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("connection is already authenticated")]
    AlreadyAuthenticated,

    #[error("connection is not authenticated")]
    NotAuthenticated,

    #[error("connection is not in a conversation")]
    NotInConversation,
}

/// 永続化層（外部コラボレーター）へのアクセスエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// イベント配信のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// 配信先のユーザーが接続していない
    #[error("User '{0}' has no live connection")]
    ClientNotFound(String),

    /// チャンネルへの送信に失敗した
    #[error("Failed to push event: {0}")]
    PushFailed(String),
}
