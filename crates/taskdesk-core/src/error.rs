//! Errors - エラー型と分類
//!
//! 呼び出し側（HTTP 層など、このクレートの外）は `ErrorKind` を見て
//! 4xx / 404 / 5xx に振り分けます。

use thiserror::Error;

use crate::ports::{CacheError, ChannelError, MailError, StoreError};

/// ErrorKind はエラーの運用分類
///
/// - ClientInput: 入力不正（副作用なし、4xx 相当）。ストアの一意制約違反も含む
/// - NotFound: 存在しない id（入力不正とは区別する）
/// - Dependency: 永続化・キャッシュ・メール・配送の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    NotFound,
    Dependency,
}

#[derive(Debug, Error)]
pub enum TaskdeskError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl TaskdeskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::AlreadyExists { .. } => ErrorKind::ClientInput,
            // unique-name violation that slipped past the service's pre-check
            Self::Store(StoreError::Conflict(_)) => ErrorKind::ClientInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Store(_) | Self::Cache(_) | Self::Channel(_) | Self::Mail(_) => {
                ErrorKind::Dependency
            }
        }
    }
}

pub type Result<T, E = TaskdeskError> = std::result::Result<T, E>;
