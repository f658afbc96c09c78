//! InMemoryTaskStore - 開発・テスト用の正本
//!
//! # 実装詳細
//! - 1 つの tokio Mutex の下に全コレクションを持つ
//! - 挿入順を保持する（並び順の指定がないときはこの順で返す）
//! - insert_status_map は Task 側の status 参照列にも追記する

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    Comment, CommentId, Status, StatusId, StatusMap, StatusName, Task, TaskId, User, UserId,
};
use crate::ports::{StoreError, TaskStore, UserDirectory};
use crate::query::{TaskOrdering, TaskPredicate};

#[derive(Default)]
struct StoreState {
    task_order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
    status_maps: Vec<StatusMap>,
    statuses: HashMap<StatusId, Status>,
    comments: Vec<Comment>,
    users: HashMap<UserId, User>,
}

impl StoreState {
    fn tasks_in_order(&self) -> impl Iterator<Item = &Task> {
        self.task_order.iter().filter_map(|id| self.tasks.get(id))
    }

    fn comment_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users are owned by another service; this is how tests and the demo
    /// binary seed them.
    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user.id, user);
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_tasks(
        &self,
        predicate: &TaskPredicate,
        ordering: Option<&TaskOrdering>,
    ) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks_in_order()
            .filter(|t| predicate.matches(t))
            .cloned()
            .collect();
        if let Some(ordering) = ordering {
            // stable: equal keys keep insertion order
            tasks.sort_by(|a, b| ordering.compare(a, b));
        }
        Ok(tasks)
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tasks_in_order().find(|t| t.name == name).cloned())
    }

    async fn find_tasks_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks_in_order()
            .filter(|t| !t.is_deleted)
            .filter(|t| t.due_date.is_some_and(|due| start <= due && due < end))
            .cloned()
            .collect())
    }

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::Conflict(format!("duplicate task id {}", task.id)));
        }
        if state.tasks.values().any(|t| t.name == task.name) {
            return Err(StoreError::Conflict(format!(
                "duplicate task name '{}'",
                task.name
            )));
        }
        state.task_order.push(task.id);
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        if state
            .tasks
            .values()
            .any(|t| t.id != task.id && t.name == task.name)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate task name '{}'",
                task.name
            )));
        }
        let Some(slot) = state.tasks.get_mut(&task.id) else {
            return Err(StoreError::Missing {
                entity: "task",
                id: task.id.to_string(),
            });
        };
        *slot = task.clone();
        Ok(task)
    }

    async fn status_maps_for(&self, task_id: TaskId) -> Result<Vec<StatusMap>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .status_maps
            .iter()
            .filter(|m| m.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn insert_status_map(&self, map: StatusMap) -> Result<StatusMap, StoreError> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&map.task_id) else {
            return Err(StoreError::Missing {
                entity: "task",
                id: map.task_id.to_string(),
            });
        };
        task.status.push(map.id);
        state.status_maps.push(map.clone());
        Ok(map)
    }

    async fn find_status(&self, id: StatusId) -> Result<Option<Status>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.statuses.get(&id).cloned())
    }

    async fn find_status_by_name(&self, name: StatusName) -> Result<Option<Status>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.statuses.values().find(|s| s.name == name).cloned())
    }

    async fn insert_status(&self, status: Status) -> Result<Status, StoreError> {
        let mut state = self.state.lock().await;
        if state.statuses.values().any(|s| s.name == status.name) {
            return Err(StoreError::Conflict(format!(
                "status '{}' already exists",
                status.name
            )));
        }
        state.statuses.insert(status.id, status.clone());
        Ok(status)
    }

    async fn count_comments(&self, task_id: TaskId) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state.comments.iter().filter(|c| c.task_id == task_id).count())
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        if !state.tasks.contains_key(&comment.task_id) {
            return Err(StoreError::Missing {
                entity: "task",
                id: comment.task_id.to_string(),
            });
        }
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.comment_mut(comment.id) else {
            return Err(StoreError::Missing {
                entity: "comment",
                id: comment.id.to_string(),
            });
        };
        *slot = comment.clone();
        Ok(comment)
    }
}

#[async_trait]
impl UserDirectory for InMemoryTaskStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).filter(|u| !u.is_deleted).cloned())
    }
}
