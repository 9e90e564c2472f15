//! UseCase 層のエラー型定義

use thiserror::Error;

/// 会話ルーム入室のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinConversationError {
    /// 当事者でない、または認可照会に失敗した
    ///
    /// ストア障害も意図的にこのエラーに畳み込みます（照会できない場合は
    /// 拒否として扱い、接続は維持する）。
    #[error("Access denied to conversation '{0}'")]
    AccessDenied(String),
}
