//! Task query engine.
//!
//! Pipeline: base predicate → fetch + status join → post-join filter →
//! aggregates over the whole filtered set → page slice → per-item counts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::filter::{SearchSpec, SortSpec, compile};
use crate::domain::{CurrentStatus, Task, TaskId, latest_status_map};
use crate::error::{Result, TaskdeskError};
use crate::ports::TaskStore;

/// Validated page/limit pair (both >= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 5;

    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 || limit < 1 {
            return Err(TaskdeskError::invalid(
                "page must be >= 1 and limit must be > 0",
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total_record: usize,
    pub current_page: u32,
    pub limit: u32,
    pub total_page: usize,
    /// Sum of like-set sizes over every filtered task (not just this page).
    #[serde(rename = "totalTaskLiked")]
    pub total_liked: usize,
    /// Filtered tasks carrying a non-empty legacy comment.
    #[serde(rename = "totalTaskComment")]
    pub total_commented: usize,
}

/// A task with its joined status and derived counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub current_status: CurrentStatus,
    pub comment_count: usize,
    pub liked_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    pub pagination_info: PaginationInfo,
    pub tasks: Vec<TaskView>,
}

pub struct TaskQueryEngine {
    store: Arc<dyn TaskStore>,
}

impl TaskQueryEngine {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub async fn query(
        &self,
        search: Option<&SearchSpec>,
        sort: Option<&SortSpec>,
        page: u32,
        limit: u32,
    ) -> Result<TaskPage> {
        let request = PageRequest::new(page, limit)?;
        let compiled = compile(search, sort)?;

        let tasks = self
            .store
            .find_tasks(&compiled.predicate, compiled.ordering.as_ref())
            .await?;

        let mut joined = Vec::with_capacity(tasks.len());
        for task in tasks {
            let status = self.current_status(task.id).await?;
            if let Some(filter) = &compiled.post_join
                && !filter.matches(&status)
            {
                continue;
            }
            joined.push((task, status));
        }

        let total_record = joined.len();
        let total_liked = joined.iter().map(|(t, _)| t.likes.count()).sum();
        let total_commented = joined.iter().filter(|(t, _)| t.has_legacy_comment()).count();

        let mut items = Vec::new();
        for (task, current_status) in joined
            .into_iter()
            .skip(request.offset())
            .take(request.limit() as usize)
        {
            items.push(self.attach_counts(task, current_status).await?);
        }

        tracing::debug!(
            total_record,
            page = request.page(),
            returned = items.len(),
            "task query"
        );

        Ok(TaskPage {
            pagination_info: PaginationInfo {
                total_record,
                current_page: request.page(),
                limit: request.limit(),
                total_page: total_record.div_ceil(request.limit() as usize),
                total_liked,
                total_commented,
            },
            tasks: items,
        })
    }

    /// Status of the most recent StatusMap, or `Unknown` when the task has no
    /// history or the referenced status does not resolve.
    pub async fn current_status(&self, task_id: TaskId) -> Result<CurrentStatus> {
        let maps = self.store.status_maps_for(task_id).await?;
        let Some(latest) = latest_status_map(&maps) else {
            return Ok(CurrentStatus::Unknown);
        };
        Ok(match self.store.find_status(latest.status_id).await? {
            Some(status) => CurrentStatus::known(latest, &status),
            None => {
                tracing::warn!(
                    %task_id,
                    status_id = %latest.status_id,
                    "dangling status reference"
                );
                CurrentStatus::Unknown
            }
        })
    }

    /// Single task joined and counted, regardless of the soft-delete flag.
    pub async fn view(&self, task: Task) -> Result<TaskView> {
        let status = self.current_status(task.id).await?;
        self.attach_counts(task, status).await
    }

    async fn attach_counts(&self, task: Task, current_status: CurrentStatus) -> Result<TaskView> {
        let comment_count = self.store.count_comments(task.id).await?;
        let liked_count = task.likes.count();
        Ok(TaskView {
            task,
            current_status,
            comment_count,
            liked_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Comment, CommentId, Status, StatusId, StatusMap, StatusMapId, StatusName, UserId,
    };
    use crate::error::ErrorKind;
    use crate::impls::InMemoryTaskStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        engine: TaskQueryEngine,
        pending: StatusId,
        completed: StatusId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTaskStore::new());
        let pending = StatusId::from_ulid(Ulid::new());
        let completed = StatusId::from_ulid(Ulid::new());
        store
            .insert_status(Status { id: pending, name: StatusName::Pending })
            .await
            .unwrap();
        store
            .insert_status(Status { id: completed, name: StatusName::Completed })
            .await
            .unwrap();
        Fixture {
            engine: TaskQueryEngine::new(store.clone()),
            store,
            pending,
            completed,
        }
    }

    impl Fixture {
        async fn add_task(&self, name: &str, minutes: i64) -> Task {
            let task = Task::new(
                TaskId::from_ulid(Ulid::new()),
                name,
                t0() + Duration::minutes(minutes),
            );
            self.store.insert_task(task).await.unwrap()
        }

        async fn set_status(&self, task_id: TaskId, status_id: StatusId, minutes: i64) {
            self.store
                .insert_status_map(StatusMap {
                    id: StatusMapId::from_ulid(Ulid::new()),
                    task_id,
                    status_id,
                    created_at: t0() + Duration::minutes(minutes),
                })
                .await
                .unwrap();
        }
    }

    fn names(page: &TaskPage) -> Vec<String> {
        page.tasks.iter().map(|v| v.task.name.clone()).collect()
    }

    #[rstest]
    #[case(0, 5)]
    #[case(1, 0)]
    #[case(0, 0)]
    #[tokio::test]
    async fn rejects_invalid_page_or_limit(#[case] page: u32, #[case] limit: u32) {
        let f = fixture().await;
        let err = f.engine.query(None, None, page, limit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientInput);
    }

    #[tokio::test]
    async fn second_page_of_twelve() {
        let f = fixture().await;
        for i in 1..=12 {
            f.add_task(&format!("task-{i:02}"), i).await;
        }
        let sort = SortSpec::new("taskName", "ASC");

        let page = f.engine.query(None, Some(&sort), 2, 5).await.unwrap();

        assert_eq!(
            names(&page),
            vec!["task-06", "task-07", "task-08", "task-09", "task-10"]
        );
        assert_eq!(page.pagination_info.total_record, 12);
        assert_eq!(page.pagination_info.total_page, 3);
        assert_eq!(page.pagination_info.current_page, 2);
        assert_eq!(page.pagination_info.limit, 5);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    #[case(7)]
    #[case(20)]
    #[tokio::test]
    async fn pages_concatenate_to_full_set(#[case] limit: u32) {
        let f = fixture().await;
        for i in 0..7 {
            f.add_task(&format!("t{i}"), i).await;
        }
        let sort = SortSpec::new("createdAt", "DESC");

        let first = f.engine.query(None, Some(&sort), 1, limit).await.unwrap();
        let total_page = first.pagination_info.total_page;
        assert_eq!(total_page, 7usize.div_ceil(limit as usize));

        let mut all = Vec::new();
        for page in 1..=total_page as u32 {
            let p = f.engine.query(None, Some(&sort), page, limit).await.unwrap();
            all.extend(names(&p));
        }
        let expected: Vec<String> = (0..7).rev().map(|i| format!("t{i}")).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn empty_result_has_zero_pages() {
        let f = fixture().await;
        let page = f.engine.query(None, None, 1, 5).await.unwrap();
        assert!(page.tasks.is_empty());
        assert_eq!(page.pagination_info.total_page, 0);
        assert_eq!(page.pagination_info.total_record, 0);
    }

    #[tokio::test]
    async fn page_beyond_range_is_empty_not_error() {
        let f = fixture().await;
        f.add_task("only", 0).await;
        let page = f.engine.query(None, None, 9, 5).await.unwrap();
        assert!(page.tasks.is_empty());
        assert_eq!(page.pagination_info.total_record, 1);
        assert_eq!(page.pagination_info.total_page, 1);
    }

    #[tokio::test]
    async fn status_filter_uses_latest_status_map_only() {
        let f = fixture().await;
        let done = f.add_task("done", 0).await;
        let reopened = f.add_task("reopened", 1).await;
        let fresh = f.add_task("fresh", 2).await;

        f.set_status(done.id, f.pending, 0).await;
        f.set_status(done.id, f.completed, 10).await;
        f.set_status(reopened.id, f.completed, 0).await;
        f.set_status(reopened.id, f.pending, 10).await;
        let _ = fresh; // no history at all

        let search = SearchSpec::new("statusName", "Completed");
        let page = f.engine.query(Some(&search), None, 1, 10).await.unwrap();

        assert_eq!(names(&page), vec!["done"]);
        assert_eq!(page.pagination_info.total_record, 1);
        assert_eq!(page.tasks[0].current_status.name(), Some(StatusName::Completed));
    }

    #[tokio::test]
    async fn aggregates_cover_filtered_set_not_page() {
        let f = fixture().await;
        for i in 0..4 {
            let mut task = f.add_task(&format!("t{i}"), i).await;
            for _ in 0..=i {
                task.likes.toggle(UserId::from_ulid(Ulid::new()));
            }
            if i % 2 == 0 {
                task.comment = Some("legacy".into());
            }
            f.store.update_task(task).await.unwrap();
        }

        let page = f.engine.query(None, None, 1, 1).await.unwrap();

        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.pagination_info.total_liked, 1 + 2 + 3 + 4);
        assert_eq!(page.pagination_info.total_commented, 2);
    }

    #[tokio::test]
    async fn items_carry_comment_and_like_counts() {
        let f = fixture().await;
        let mut task = f.add_task("discussed", 0).await;
        task.likes.toggle(UserId::from_ulid(Ulid::new()));
        let task = f.store.update_task(task).await.unwrap();
        for i in 0..3 {
            f.store
                .insert_comment(Comment::new(
                    CommentId::from_ulid(Ulid::new()),
                    task.id,
                    None,
                    format!("c{i}"),
                    t0(),
                ))
                .await
                .unwrap();
        }

        let page = f.engine.query(None, None, 1, 5).await.unwrap();

        assert_eq!(page.tasks[0].comment_count, 3);
        assert_eq!(page.tasks[0].liked_count, 1);
        assert_eq!(page.tasks[0].current_status, CurrentStatus::Unknown);
    }

    #[tokio::test]
    async fn deleted_tasks_are_never_listed() {
        let f = fixture().await;
        let mut gone = f.add_task("gone", 0).await;
        f.add_task("kept", 1).await;
        gone.is_deleted = true;
        f.store.update_task(gone).await.unwrap();

        let page = f.engine.query(None, None, 1, 5).await.unwrap();
        assert_eq!(names(&page), vec!["kept"]);
    }

    #[tokio::test]
    async fn base_filter_and_sort_combine() {
        let f = fixture().await;
        f.add_task("api: auth", 0).await;
        f.add_task("ui: login", 1).await;
        f.add_task("api: billing", 2).await;

        let search = SearchSpec::new("taskName", "API");
        let sort = SortSpec::new("taskName", "DESC");
        let page = f.engine.query(Some(&search), Some(&sort), 1, 5).await.unwrap();

        assert_eq!(names(&page), vec!["api: billing", "api: auth"]);
    }

    #[tokio::test]
    async fn page_serializes_with_wire_names() {
        let f = fixture().await;
        f.add_task("x", 0).await;
        let page = f.engine.query(None, None, 1, 5).await.unwrap();
        let v = serde_json::to_value(&page).unwrap();

        assert_eq!(v["paginationInfo"]["totalRecord"], 1);
        assert_eq!(v["paginationInfo"]["totalTaskLiked"], 0);
        assert_eq!(v["tasks"][0]["taskName"], "x");
        assert_eq!(v["tasks"][0]["commentCount"], 0);
        assert_eq!(v["tasks"][0]["likedCount"], 0);
    }
}
