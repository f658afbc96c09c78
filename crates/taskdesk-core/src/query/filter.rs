//! Filter/Sort compiler.
//!
//! Turns the declarative `{name, value}` search descriptor and `{name, order}`
//! sort descriptor into a [`TaskPredicate`] the store can evaluate, an optional
//! [`PostJoinFilter`] that needs the joined status, and a [`TaskOrdering`].

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CurrentStatus, Task};
use crate::error::{Result, TaskdeskError};

/// Search descriptor as sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub name: String,
    pub value: String,
}

impl SearchSpec {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse the JSON form (`{"name": "...", "value": "..."}`).
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| TaskdeskError::invalid(format!("invalid search object: {e}")))
    }
}

/// Sort descriptor as sent by clients. Both fields must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub name: Option<String>,
    pub order: Option<String>,
}

impl SortSpec {
    pub fn new(name: impl Into<String>, order: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            order: Some(order.into()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| TaskdeskError::invalid(format!("invalid sort object: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    TaskName,
    Priority,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    AssignDate,
    DueDate,
}

impl DateField {
    fn get(self, task: &Task) -> Option<DateTime<Utc>> {
        match self {
            DateField::AssignDate => task.assign_date,
            DateField::DueDate => task.due_date,
        }
    }
}

/// Predicate on a single task field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    /// Case-insensitive substring match. `needle` is stored lowercased.
    Contains { field: TextField, needle: String },
    DateEquals { field: DateField, value: DateTime<Utc> },
    IsLiked(bool),
}

impl FieldPredicate {
    fn matches(&self, task: &Task) -> bool {
        match self {
            FieldPredicate::Contains { field, needle } => {
                let haystack = match field {
                    TextField::TaskName => Some(task.name.as_str()),
                    TextField::Priority => task.priority.as_ref().map(|p| p.as_str()),
                    TextField::Category => task.category.as_deref(),
                };
                haystack.is_some_and(|h| h.to_lowercase().contains(needle.as_str()))
            }
            FieldPredicate::DateEquals { field, value } => field.get(task) == Some(*value),
            FieldPredicate::IsLiked(expected) => task.likes.is_liked == *expected,
        }
    }
}

/// Base (pre-join) predicate.
///
/// Soft-deleted tasks are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPredicate {
    pub include_deleted: bool,
    pub field: Option<FieldPredicate>,
}

impl TaskPredicate {
    /// All non-deleted tasks.
    pub fn active() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldPredicate) -> Self {
        self.field = Some(field);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.is_deleted && !self.include_deleted {
            return false;
        }
        self.field.as_ref().is_none_or(|f| f.matches(task))
    }
}

/// Predicate that can only be evaluated after the status join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostJoinFilter {
    /// Exact match on the current status name. Unknown status never matches.
    StatusName(String),
}

impl PostJoinFilter {
    pub fn matches(&self, status: &CurrentStatus) -> bool {
        match self {
            PostJoinFilter::StatusName(expected) => {
                status.name().is_some_and(|name| name.as_str() == expected)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    TaskName,
    Description,
    Priority,
    Category,
    AssignDate,
    DueDate,
    IsLiked,
    CreatedAt,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "taskName" => SortField::TaskName,
            "description" => SortField::Description,
            "priority" => SortField::Priority,
            "category" => SortField::Category,
            "assignDate" => SortField::AssignDate,
            "dueDate" => SortField::DueDate,
            "isLiked" => SortField::IsLiked,
            "createdAt" => SortField::CreatedAt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Comparator over tasks. Missing values sort before present ones (ascending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOrdering {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TaskOrdering {
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ord = match self.field {
            SortField::TaskName => a.name.cmp(&b.name),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Category => a.category.cmp(&b.category),
            SortField::AssignDate => a.assign_date.cmp(&b.assign_date),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::IsLiked => a.likes.is_liked.cmp(&b.likes.is_liked),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// Output of the compiler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub predicate: TaskPredicate,
    pub post_join: Option<PostJoinFilter>,
    pub ordering: Option<TaskOrdering>,
}

pub fn compile(search: Option<&SearchSpec>, sort: Option<&SortSpec>) -> Result<CompiledQuery> {
    let mut query = CompiledQuery::default();

    if let Some(search) = search {
        match compile_search(search)? {
            Compiled::Base(field) => query.predicate = TaskPredicate::active().with_field(field),
            Compiled::PostJoin(filter) => query.post_join = Some(filter),
            Compiled::Ignored => {
                tracing::debug!(field = %search.name, "ignoring unrecognized search field");
            }
        }
    }

    if let Some(sort) = sort {
        query.ordering = compile_sort(sort)?;
    }

    Ok(query)
}

enum Compiled {
    Base(FieldPredicate),
    PostJoin(PostJoinFilter),
    Ignored,
}

fn compile_search(search: &SearchSpec) -> Result<Compiled> {
    let text = |field| FieldPredicate::Contains {
        field,
        needle: search.value.to_lowercase(),
    };
    Ok(match search.name.as_str() {
        "taskName" => Compiled::Base(text(TextField::TaskName)),
        "priority" => Compiled::Base(text(TextField::Priority)),
        "category" => Compiled::Base(text(TextField::Category)),
        "assignDate" => Compiled::Base(FieldPredicate::DateEquals {
            field: DateField::AssignDate,
            value: parse_date(&search.value)?,
        }),
        "dueDate" => Compiled::Base(FieldPredicate::DateEquals {
            field: DateField::DueDate,
            value: parse_date(&search.value)?,
        }),
        "isLiked" => Compiled::Base(FieldPredicate::IsLiked(
            search.value.eq_ignore_ascii_case("true"),
        )),
        "statusName" => Compiled::PostJoin(PostJoinFilter::StatusName(search.value.clone())),
        _ => Compiled::Ignored,
    })
}

fn compile_sort(sort: &SortSpec) -> Result<Option<TaskOrdering>> {
    let (Some(name), Some(order)) = (sort.name.as_deref(), sort.order.as_deref()) else {
        return Err(TaskdeskError::invalid(
            "invalid sort object properties: both name and order are required",
        ));
    };
    let direction = if order == "ASC" {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    let Some(field) = SortField::parse(name) else {
        tracing::debug!(field = %name, "ignoring unrecognized sort field");
        return Ok(None);
    };
    Ok(Some(TaskOrdering { field, direction }))
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (UTC) and plain
/// `YYYY-MM-DD` dates (UTC midnight).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(TaskdeskError::invalid(format!("unparsable date '{raw}'")))
}
