//! Domain model (IDs, tasks, status history, comments, reminders).

pub mod comment;
pub mod ids;
pub mod reminder;
pub mod status;
pub mod task;
pub mod user;

pub use comment::Comment;
pub use ids::{CommentId, Id, IdMarker, StatusId, StatusMapId, TaskId, UserId};
pub use reminder::{ReminderBatch, ReminderRecord, ReminderWindow, into_batches};
pub use status::{
    CurrentStatus, Status, StatusHistoryEntry, StatusMap, StatusName, latest_status_map,
};
pub use task::{Likes, NewTask, Priority, Task, TaskPatch};
pub use user::User;
