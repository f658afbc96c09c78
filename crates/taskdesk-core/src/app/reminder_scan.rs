//! ReminderScanner - 翌日が期限のタスクを集めてバッチで publish する
//!
//! # フロー
//! 1. 基準日時から翌日 [00:00, 24:00) の窓を作る（UTC）
//! 2. 窓に期限が入る未削除タスクを取得
//! 3. 担当者の連絡先を引く（解決できないものは捨てる）
//! 4. batch_size ごとに分割し、1 バッチずつ順に publish
//!
//! publish の失敗はそのバッチだけの失敗で、後続のバッチは続行する。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ReminderBatch, ReminderRecord, ReminderWindow, into_batches};
use crate::error::Result;
use crate::ports::{Clock, MessageChannel, TaskStore, UserDirectory};

/// Outcome of one scan-and-publish cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub window_start: Option<DateTime<Utc>>,
    /// Tasks due in the window.
    pub due: usize,
    /// Tasks dropped for lack of a contact address.
    pub skipped: usize,
    pub batches: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct ReminderScanner {
    store: Arc<dyn TaskStore>,
    users: Arc<dyn UserDirectory>,
    channel: Arc<dyn MessageChannel>,
    clock: Arc<dyn Clock>,
    topic: String,
    batch_size: usize,
}

impl ReminderScanner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        users: Arc<dyn UserDirectory>,
        channel: Arc<dyn MessageChannel>,
        clock: Arc<dyn Clock>,
        topic: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            users,
            channel,
            clock,
            topic: topic.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reminder records for tasks due the calendar day after `reference`,
    /// in store order.
    pub async fn scan(&self, reference: DateTime<Utc>) -> Result<Vec<ReminderRecord>> {
        Ok(self.scan_counted(reference).await?.0)
    }

    pub fn batches(&self, records: Vec<ReminderRecord>) -> Vec<ReminderBatch> {
        into_batches(records, self.batch_size)
    }

    /// Scan for `reference` and publish every batch, one at a time.
    ///
    /// Errs only when the scan itself fails; publish failures are counted.
    pub async fn run_once(&self, reference: DateTime<Utc>) -> Result<ScanReport> {
        let window = ReminderWindow::for_reference(reference);
        let (records, skipped) = self.scan_counted(reference).await?;
        let due = records.len() + skipped;
        let batches = self.batches(records);

        let mut report = ScanReport {
            window_start: Some(window.start),
            due,
            skipped,
            batches: batches.len(),
            ..ScanReport::default()
        };

        for (index, batch) in batches.iter().enumerate() {
            let payload = match batch.encode() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(index, error = %e, "reminder batch not encodable");
                    report.failed += 1;
                    continue;
                }
            };
            match self.channel.publish(&self.topic, payload).await {
                Ok(message_id) => {
                    tracing::debug!(
                        index,
                        size = batch.len(),
                        %message_id,
                        "reminder batch published"
                    );
                    report.published += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        index,
                        size = batch.len(),
                        error = %e,
                        "reminder batch publish failed"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            window_start = %window.start,
            due = report.due,
            skipped = report.skipped,
            batches = report.batches,
            published = report.published,
            failed = report.failed,
            "reminder scan finished"
        );
        Ok(report)
    }

    /// [`ReminderScanner::run_once`] with the current time as reference.
    pub async fn run_now(&self) -> Result<ScanReport> {
        self.run_once(self.clock.now()).await
    }

    async fn scan_counted(&self, reference: DateTime<Utc>) -> Result<(Vec<ReminderRecord>, usize)> {
        let window = ReminderWindow::for_reference(reference);
        let tasks = self
            .store
            .find_tasks_due_between(window.start, window.end)
            .await?;

        let mut records = Vec::with_capacity(tasks.len());
        let mut skipped = 0;
        for task in tasks {
            let Some(due_date) = task.due_date.filter(|d| window.contains(*d)) else {
                continue;
            };
            let address = match task.user_id {
                Some(user_id) => self
                    .users
                    .find_user(user_id)
                    .await?
                    .and_then(|u| u.contact_address().map(str::to_string)),
                None => None,
            };
            let Some(recipient_address) = address else {
                tracing::debug!(task_id = %task.id, "no contact address; reminder dropped");
                skipped += 1;
                continue;
            };
            records.push(ReminderRecord {
                recipient_address,
                task_name: task.name,
                due_date,
            });
        }
        Ok((records, skipped))
    }
}
