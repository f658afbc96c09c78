//! Comments posted on a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, TaskId, UserId};
use super::task::Likes;

/// A comment on a task. Independently addressable and likeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub user_id: Option<UserId>,
    #[serde(rename = "comment")]
    pub text: String,
    #[serde(flatten)]
    pub likes: Likes,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        id: CommentId,
        task_id: TaskId,
        user_id: Option<UserId>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            user_id,
            text: text.into(),
            likes: Likes::default(),
            created_at,
        }
    }
}
