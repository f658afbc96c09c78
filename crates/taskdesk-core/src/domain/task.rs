//! Task record and like-set semantics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{StatusId, StatusMapId, TaskId, UserId};

/// Task priority. Ordering follows urgency (Low < Medium < High).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Set of users who liked an entity, plus the `isLiked` flag.
///
/// `is_liked` mirrors whether the user of the most recent toggle is in
/// `liked_by`; toggling twice with the same user restores the prior state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Likes {
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub liked_by: Vec<UserId>,
}

impl Likes {
    /// Toggle `user`'s membership. Returns the new `is_liked` value.
    pub fn toggle(&mut self, user: UserId) -> bool {
        if let Some(pos) = self.liked_by.iter().position(|u| *u == user) {
            self.liked_by.remove(pos);
            self.is_liked = false;
        } else {
            self.liked_by.push(user);
            self.is_liked = true;
        }
        self.is_liked
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.liked_by.contains(&user)
    }

    pub fn count(&self) -> usize {
        self.liked_by.len()
    }
}

/// A persisted task.
///
/// `status` is the append-only list of StatusMap references; the current
/// status is derived from the StatusMap records themselves, never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "taskName")]
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub user_id: Option<UserId>,
    pub assign_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub status: Vec<StatusMapId>,
    #[serde(flatten)]
    pub likes: Likes,
    /// Legacy free-text comment kept on the task itself.
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            priority: None,
            category: None,
            user_id: None,
            assign_date: None,
            due_date: None,
            is_deleted: false,
            status: Vec::new(),
            likes: Likes::default(),
            comment: None,
            created_at,
        }
    }

    pub fn has_legacy_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
        if let Some(user_id) = patch.user_id {
            self.user_id = Some(user_id);
        }
        if let Some(assign_date) = patch.assign_date {
            self.assign_date = Some(assign_date);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(comment) = &patch.comment {
            self.comment = Some(comment.clone());
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(rename = "taskName")]
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub user_id: Option<UserId>,
    /// Initial status; becomes the first StatusMap entry.
    pub status_id: Option<StatusId>,
    /// Initial comment; stored on the task and as a Comment record.
    pub comment: Option<String>,
    pub assign_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update for a task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(rename = "taskName")]
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub user_id: Option<UserId>,
    pub assign_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}
