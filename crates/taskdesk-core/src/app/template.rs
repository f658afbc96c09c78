//! Mail bodies for reminders and assignments.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::ReminderRecord;

pub const REMINDER_SUBJECT: &str = "Task Due Tomorrow";
pub const ASSIGNMENT_SUBJECT: &str = "Task Assigned";

const DEFAULT_REMINDER_BODY: &str = "<html>\n  <body>\n    <h2>Reminder</h2>\n    \
<p>Your task <strong>{taskName}</strong> is due on {dueDate}.</p>\n  </body>\n</html>\n";

/// HTML reminder template with `{taskName}` and `{dueDate}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTemplate {
    body: String,
}

impl Default for ReminderTemplate {
    fn default() -> Self {
        Self {
            body: DEFAULT_REMINDER_BODY.to_string(),
        }
    }
}

impl ReminderTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    /// Every occurrence of each placeholder is replaced.
    pub fn render(&self, record: &ReminderRecord) -> String {
        self.body
            .replace("{taskName}", &record.task_name)
            .replace("{dueDate}", &format_due_date(record.due_date))
    }
}

pub fn assignment_body(task_name: &str, due_date: Option<DateTime<Utc>>) -> String {
    let due = due_date.map(format_due_date).unwrap_or_else(|| "-".into());
    format!("<h1>Task Assigned</h1>\n<p>Task Name: {task_name}</p>\n<p>Due Date: {due}</p>")
}

fn format_due_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
