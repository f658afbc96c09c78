//! Reminder payloads and the due-date window they are selected by.

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One reminder: who gets it, for which task, due when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRecord {
    pub recipient_address: String,
    pub task_name: String,
    pub due_date: DateTime<Utc>,
}

/// A batch of reminders published as one message.
///
/// Wire format: a JSON array of [`ReminderRecord`], in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderBatch(pub Vec<ReminderRecord>);

impl ReminderBatch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[ReminderRecord] {
        &self.0
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Split `records` into batches of at most `batch_size`, preserving order.
///
/// Produces `ceil(N / batch_size)` batches; only the last may be short.
/// A `batch_size` of zero is treated as one.
pub fn into_batches(records: Vec<ReminderRecord>, batch_size: usize) -> Vec<ReminderBatch> {
    records
        .chunks(batch_size.max(1))
        .map(|chunk| ReminderBatch(chunk.to_vec()))
        .collect()
}

/// Half-open `[start, end)` window covering the calendar day after the
/// reference instant (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReminderWindow {
    pub fn for_reference(reference: DateTime<Utc>) -> Self {
        let today = reference.date_naive();
        let tomorrow = today + Days::new(1);
        let day_after = tomorrow + Days::new(1);
        Self {
            start: tomorrow.and_time(NaiveTime::MIN).and_utc(),
            end: day_after.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}
