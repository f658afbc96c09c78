//! TaskStore port - 永続化層（正本 / system of record）
//!
//! TaskStore は以下を管理します：
//! - Task（論理削除フラグ付き）
//! - StatusMap（追記のみの状態履歴）と Status カタログ
//! - Comment
//!
//! # 設計原則
//! - 述語（TaskPredicate）と並び順（TaskOrdering）はクエリ層でコンパイル済みのものを受け取る
//! - StatusMap は immutable。状態変更は新しい StatusMap の追加で表現する
//! - キャッシュのことは知らない（無効化は app 層の責務）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Comment, CommentId, Status, StatusId, StatusMap, StatusName, Task, TaskId, User, UserId,
};
use crate::query::{TaskOrdering, TaskPredicate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} does not exist: {id}")]
    Missing { entity: &'static str, id: String },

    #[error("constraint violated: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks matching `predicate`, in `ordering` (store order when `None`).
    async fn find_tasks(
        &self,
        predicate: &TaskPredicate,
        ordering: Option<&TaskOrdering>,
    ) -> Result<Vec<Task>, StoreError>;

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError>;

    /// Non-deleted tasks with `start <= due_date < end`.
    async fn find_tasks_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError>;

    /// Replace an existing task. `StoreError::Missing` if it does not exist.
    async fn update_task(&self, task: Task) -> Result<Task, StoreError>;

    /// Status history of a task, in insertion order.
    async fn status_maps_for(&self, task_id: TaskId) -> Result<Vec<StatusMap>, StoreError>;

    async fn insert_status_map(&self, map: StatusMap) -> Result<StatusMap, StoreError>;

    async fn find_status(&self, id: StatusId) -> Result<Option<Status>, StoreError>;

    async fn find_status_by_name(&self, name: StatusName) -> Result<Option<Status>, StoreError>;

    async fn insert_status(&self, status: Status) -> Result<Status, StoreError>;

    async fn count_comments(&self, task_id: TaskId) -> Result<usize, StoreError>;

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError>;

    async fn update_comment(&self, comment: Comment) -> Result<Comment, StoreError>;
}

/// ユーザー情報の参照（認証・ユーザー管理はこのクレートの外）
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}
