//! TaskService - タスクの読み書きの入口
//!
//! # 責務
//! - 書き込み（作成・更新・論理削除・状態変更・いいね・コメント）
//! - 書き込み後のキャッシュ無効化（失敗しても書き込みは成功扱い）
//! - 一覧取得は TaskQueryEngine、単体取得は ReadThroughCache 経由
//!
//! クライアント起因のエラーは副作用を起こす前に返す。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cache::{CacheNamespace, ReadThroughCache};
use super::template::{ASSIGNMENT_SUBJECT, assignment_body};
use crate::domain::{
    Comment, CommentId, NewTask, Priority, Status, StatusHistoryEntry, StatusId, StatusMap,
    StatusName, Task, TaskId, TaskPatch, UserId,
};
use crate::error::{Result, TaskdeskError};
use crate::observability::CacheCounts;
use crate::ports::{CacheStore, Clock, IdGenerator, Mailer, TaskStore, UserDirectory};
use crate::query::{
    FieldPredicate, SearchSpec, SortSpec, TaskPage, TaskPredicate, TaskQueryEngine, TaskView,
    TextField,
};

/// Tasks of one priority with the distinct full names of their owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySummary {
    pub priority: Priority,
    pub task_count: usize,
    pub user_names: Vec<String>,
}

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    cache: ReadThroughCache,
    engine: TaskQueryEngine,
    assignment_subject: String,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        users: Arc<dyn UserDirectory>,
        cache: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            engine: TaskQueryEngine::new(store.clone()),
            cache: ReadThroughCache::new(cache),
            store,
            users,
            mailer,
            clock,
            ids,
            assignment_subject: ASSIGNMENT_SUBJECT.to_string(),
        }
    }

    pub fn with_assignment_subject(mut self, subject: impl Into<String>) -> Self {
        self.assignment_subject = subject.into();
        self
    }

    pub fn cache_counts(&self) -> CacheCounts {
        self.cache.counts()
    }

    pub async fn query(
        &self,
        search: Option<&SearchSpec>,
        sort: Option<&SortSpec>,
        page: u32,
        limit: u32,
    ) -> Result<TaskPage> {
        self.engine.query(search, sort, page, limit).await
    }

    /// Single task with its current status and counts, served from the cache
    /// when possible. Soft-deleted tasks are still returned.
    pub async fn get_task(&self, id: TaskId) -> Result<TaskView> {
        let key = CacheNamespace::Tasks.key(id);
        let view = self
            .cache
            .get_or_load(&key, || async {
                let Some(task) = self.store.find_task(id).await? else {
                    return Ok(None);
                };
                self.engine.view(task).await.map(Some)
            })
            .await?;
        view.ok_or_else(|| TaskdeskError::not_found("task", id))
    }

    pub async fn create_status(&self, name: StatusName) -> Result<Status> {
        if self.store.find_status_by_name(name).await?.is_some() {
            return Err(TaskdeskError::AlreadyExists {
                entity: "status",
                name: name.to_string(),
            });
        }
        let status = Status {
            id: self.ids.generate(),
            name,
        };
        Ok(self.store.insert_status(status).await?)
    }

    pub async fn create_task(&self, new: NewTask) -> Result<TaskView> {
        let name = validate_name(&new.name)?;
        if self.store.find_task_by_name(&name).await?.is_some() {
            return Err(TaskdeskError::AlreadyExists { entity: "task", name });
        }
        if let Some(status_id) = new.status_id {
            self.require_status(status_id).await?;
        }

        let now = self.clock.now();
        let initial_comment = new
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut task = Task::new(self.ids.generate(), name, now);
        task.description = new.description;
        task.priority = new.priority;
        task.category = new.category;
        task.user_id = new.user_id;
        task.assign_date = new.assign_date;
        task.due_date = new.due_date;
        task.comment = initial_comment.clone();
        let task = self.store.insert_task(task).await?;

        if let Some(text) = initial_comment {
            let comment = Comment::new(self.ids.generate(), task.id, task.user_id, text, now);
            self.store.insert_comment(comment).await?;
            self.cache.invalidate(CacheNamespace::Comments).await;
        }
        if let Some(status_id) = new.status_id {
            self.append_status(task.id, status_id).await?;
        }

        tracing::info!(task_id = %task.id, name = %task.name, "task created");
        self.notify_assignee(&task).await;
        self.cache.invalidate(CacheNamespace::Tasks).await;

        let task = self.load_task(task.id).await?;
        self.engine.view(task).await
    }

    /// Apply `patch`. Comment text together with a user id is also recorded
    /// as a Comment authored by that user.
    pub async fn update_task(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        if let Some(name) = &patch.name {
            let name = validate_name(name)?;
            if let Some(other) = self.store.find_task_by_name(&name).await?
                && other.id != id
            {
                return Err(TaskdeskError::AlreadyExists { entity: "task", name });
            }
        }
        let mut task = self.load_task(id).await?;

        if let (Some(text), Some(author)) = (patch.comment.as_deref(), patch.user_id)
            && !text.trim().is_empty()
        {
            let now = self.clock.now();
            let comment = Comment::new(self.ids.generate(), id, Some(author), text.trim(), now);
            self.store.insert_comment(comment).await?;
            self.cache.invalidate(CacheNamespace::Comments).await;
        }

        task.apply(&patch);
        if let Some(name) = &patch.name {
            task.name = name.trim().to_string();
        }
        let task = self.store.update_task(task).await?;
        self.cache.invalidate(CacheNamespace::Tasks).await;
        Ok(task)
    }

    /// Soft delete. Deleting an already deleted task succeeds.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let mut task = self.load_task(id).await?;
        task.is_deleted = true;
        self.store.update_task(task).await?;
        tracing::info!(task_id = %id, "task deleted");
        self.cache.invalidate(CacheNamespace::Tasks).await;
        Ok(())
    }

    /// Append a new StatusMap; earlier entries are never touched.
    pub async fn update_status(&self, id: TaskId, status_id: StatusId) -> Result<StatusMap> {
        self.load_task(id).await?;
        self.require_status(status_id).await?;
        let map = self.append_status(id, status_id).await?;
        self.cache.invalidate(CacheNamespace::Tasks).await;
        Ok(map)
    }

    pub async fn toggle_task_like(&self, id: TaskId, user: UserId) -> Result<Task> {
        let mut task = self.load_task(id).await?;
        let liked = task.likes.toggle(user);
        let task = self.store.update_task(task).await?;
        tracing::debug!(task_id = %id, %user, liked, "task like toggled");
        self.cache.invalidate(CacheNamespace::Tasks).await;
        Ok(task)
    }

    pub async fn toggle_comment_like(&self, id: CommentId, user: UserId) -> Result<Comment> {
        let mut comment = self
            .store
            .find_comment(id)
            .await?
            .ok_or_else(|| TaskdeskError::not_found("comment", id))?;
        let liked = comment.likes.toggle(user);
        let comment = self.store.update_comment(comment).await?;
        tracing::debug!(comment_id = %id, %user, liked, "comment like toggled");
        self.cache.invalidate(CacheNamespace::Comments).await;
        Ok(comment)
    }

    pub async fn add_comment(
        &self,
        task_id: TaskId,
        author: UserId,
        text: &str,
    ) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskdeskError::invalid("comment must not be empty"));
        }
        self.load_task(task_id).await?;
        let now = self.clock.now();
        let comment = Comment::new(self.ids.generate(), task_id, Some(author), text, now);
        let comment = self.store.insert_comment(comment).await?;
        self.cache.invalidate(CacheNamespace::Comments).await;
        // comment counts are part of the cached task view
        self.cache.invalidate(CacheNamespace::Tasks).await;
        Ok(comment)
    }

    /// Status history, oldest first.
    pub async fn status_history(&self, task_id: TaskId) -> Result<Vec<StatusHistoryEntry>> {
        let task = self.load_task(task_id).await?;
        let mut maps = self.store.status_maps_for(task_id).await?;
        maps.sort_by_key(|m| m.created_at);

        let mut history = Vec::with_capacity(maps.len());
        for status_map in maps {
            let status_name = self
                .store
                .find_status(status_map.status_id)
                .await?
                .map(|s| s.name);
            history.push(StatusHistoryEntry {
                status_map,
                status_name,
                task_name: task.name.clone(),
            });
        }
        Ok(history)
    }

    /// Group non-deleted tasks whose priority contains `priority`
    /// (case-insensitive) by priority. Tasks without a resolvable owner are
    /// left out.
    pub async fn priority_summary(&self, priority: &str) -> Result<Vec<PrioritySummary>> {
        let needle = priority.trim();
        if needle.is_empty() {
            return Err(TaskdeskError::invalid("priority is required"));
        }
        let predicate = TaskPredicate::active().with_field(FieldPredicate::Contains {
            field: TextField::Priority,
            needle: needle.to_lowercase(),
        });
        let tasks = self.store.find_tasks(&predicate, None).await?;

        let mut groups: BTreeMap<Priority, (usize, BTreeSet<String>)> = BTreeMap::new();
        for task in tasks {
            let (Some(priority), Some(user_id)) = (task.priority, task.user_id) else {
                continue;
            };
            let Some(user) = self.users.find_user(user_id).await? else {
                continue;
            };
            let entry = groups.entry(priority).or_default();
            entry.0 += 1;
            entry.1.insert(user.full_name());
        }

        Ok(groups
            .into_iter()
            .rev()
            .map(|(priority, (task_count, names))| PrioritySummary {
                priority,
                task_count,
                user_names: names.into_iter().collect(),
            })
            .collect())
    }

    async fn load_task(&self, id: TaskId) -> Result<Task> {
        self.store
            .find_task(id)
            .await?
            .ok_or_else(|| TaskdeskError::not_found("task", id))
    }

    async fn require_status(&self, id: StatusId) -> Result<Status> {
        self.store
            .find_status(id)
            .await?
            .ok_or_else(|| TaskdeskError::not_found("status", id))
    }

    async fn append_status(&self, task_id: TaskId, status_id: StatusId) -> Result<StatusMap> {
        let map = StatusMap {
            id: self.ids.generate(),
            task_id,
            status_id,
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_status_map(map).await?)
    }

    /// Mail the owner about a new assignment. Failures are logged only.
    async fn notify_assignee(&self, task: &Task) {
        let Some(user_id) = task.user_id else {
            return;
        };
        let user = match self.users.find_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(task_id = %task.id, %user_id, error = %e, "assignee lookup failed");
                return;
            }
        };
        let Some(address) = user.contact_address() else {
            return;
        };
        let body = assignment_body(&task.name, task.due_date);
        if let Err(e) = self.mailer.send(address, &self.assignment_subject, &body).await {
            tracing::warn!(task_id = %task.id, error = %e, "assignment mail failed");
        }
    }
}

fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TaskdeskError::invalid("task name must not be empty"));
    }
    Ok(name.to_string())
}
