//! Status catalogue and the append-only status history of a task.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{StatusId, StatusMapId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusName {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl StatusName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusName::Pending => "Pending",
            StatusName::InProgress => "In Progress",
            StatusName::Completed => "Completed",
        }
    }
}

impl fmt::Display for StatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(StatusName::Pending),
            "In Progress" => Ok(StatusName::InProgress),
            "Completed" => Ok(StatusName::Completed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: StatusId,
    #[serde(rename = "statusName")]
    pub name: StatusName,
}

/// One immutable entry in a task's status history.
///
/// A status change is a new StatusMap, never an edit of an old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMap {
    pub id: StatusMapId,
    pub task_id: TaskId,
    pub status_id: StatusId,
    pub created_at: DateTime<Utc>,
}

/// Picks the most recent entry of a status history.
///
/// Ties on `created_at` go to the entry that comes later in `maps`, i.e. the
/// one appended last.
pub fn latest_status_map(maps: &[StatusMap]) -> Option<&StatusMap> {
    maps.iter().max_by_key(|m| m.created_at)
}

/// Status joined onto a task at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CurrentStatus {
    /// The task has no status history yet.
    Unknown,
    #[serde(rename_all = "camelCase")]
    Known {
        status_map_id: StatusMapId,
        status_id: StatusId,
        status_name: StatusName,
        since: DateTime<Utc>,
    },
}

impl CurrentStatus {
    pub fn known(map: &StatusMap, status: &Status) -> Self {
        CurrentStatus::Known {
            status_map_id: map.id,
            status_id: status.id,
            status_name: status.name,
            since: map.created_at,
        }
    }

    pub fn name(&self) -> Option<StatusName> {
        match self {
            CurrentStatus::Unknown => None,
            CurrentStatus::Known { status_name, .. } => Some(*status_name),
        }
    }
}

/// One row of a task's status history, resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status_map: StatusMap,
    /// `None` when the referenced status no longer resolves.
    pub status_name: Option<StatusName>,
    pub task_name: String,
}
