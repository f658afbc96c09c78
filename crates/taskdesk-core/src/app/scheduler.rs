//! ReminderJob - 定期的に ReminderScanner を起動するティッカー
//!
//! # 設計
//! - 時刻は Clock から取り、待ちは tokio::time::sleep（テストでは paused time）
//! - 1 tick 内は scan → publish を直列に実行
//! - tick の失敗はログに出すだけで、次の tick は必ず来る
//! - 停止は WorkerGroup の watch チャネル

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::reminder_scan::ReminderScanner;
use crate::ports::Clock;
use crate::worker::shutdown_requested;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Fixed interval, first run one interval after start.
    Every(#[serde(with = "secs")] Duration),
    /// Once a day at this UTC wall-clock time.
    DailyAt(NaiveTime),
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::DailyAt(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl Schedule {
    /// How long to wait from `now` until the next run.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Schedule::Every(interval) => *interval,
            Schedule::DailyAt(at) => {
                let today = now.date_naive().and_time(*at).and_utc();
                let next = if today > now {
                    today
                } else {
                    (now.date_naive() + Days::new(1)).and_time(*at).and_utc()
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

pub struct ReminderJob {
    scanner: Arc<ReminderScanner>,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
}

impl ReminderJob {
    pub fn new(scanner: Arc<ReminderScanner>, schedule: Schedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            scanner,
            schedule,
            clock,
        }
    }

    /// Tick until shutdown. Meant for [`crate::worker::WorkerGroup::spawn`].
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticks: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = self.schedule.next_delay(self.clock.now());
            tracing::debug!(delay_secs = delay.as_secs(), "next reminder tick scheduled");

            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }

            ticks += 1;
            match self.scanner.run_now().await {
                Ok(report) => {
                    tracing::debug!(tick = ticks, published = report.published, "tick done")
                }
                Err(e) => tracing::error!(tick = ticks, error = %e, "reminder tick failed"),
            }
        }
        tracing::info!(ticks, "reminder job stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, User, UserId};
    use crate::impls::{InMemoryMessageChannel, InMemoryTaskStore};
    use crate::ports::{FixedClock, StoreError, TaskStore, UserDirectory};
    use crate::worker::WorkerGroup;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ulid::Ulid;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[rstest]
    #[case::before(at(8, 0), 3600)]
    #[case::exactly(at(9, 0), 24 * 3600)]
    #[case::after(at(9, 30), 23 * 3600 + 1800)]
    fn daily_delay(#[case] now: DateTime<Utc>, #[case] secs: u64) {
        let schedule = Schedule::default();
        assert_eq!(schedule.next_delay(now), Duration::from_secs(secs));
    }

    #[test]
    fn every_delay_is_constant() {
        let schedule = Schedule::Every(Duration::from_secs(30));
        assert_eq!(schedule.next_delay(at(0, 0)), Duration::from_secs(30));
    }

    #[test]
    fn schedule_config_shapes() {
        #[derive(Deserialize)]
        struct Wrap {
            schedule: Schedule,
        }
        let every: Wrap = toml::from_str("schedule = { every = 90 }").unwrap();
        assert_eq!(every.schedule, Schedule::Every(Duration::from_secs(90)));

        let daily: Wrap = toml::from_str("schedule = { daily_at = \"07:30:00\" }").unwrap();
        assert_eq!(
            daily.schedule,
            Schedule::DailyAt(NaiveTime::from_hms_opt(7, 30, 0).unwrap())
        );
    }

    async fn scanner_with_one_due_task(
        channel: Arc<InMemoryMessageChannel>,
        clock: Arc<FixedClock>,
    ) -> Arc<ReminderScanner> {
        let store = Arc::new(InMemoryTaskStore::new());
        let owner = UserId::from_ulid(Ulid::new());
        store
            .insert_user(User {
                id: owner,
                first_name: None,
                last_name: None,
                email: Some("a@example.com".into()),
                is_deleted: false,
            })
            .await;
        let mut task = Task::new(TaskId::from_ulid(Ulid::new()), "due", clock.now());
        task.due_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());
        task.user_id = Some(owner);
        store.insert_task(task).await.unwrap();

        Arc::new(ReminderScanner::new(
            store.clone(),
            store,
            channel,
            clock,
            "task-reminders",
            100,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_interval_until_shutdown() {
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let channel = Arc::new(InMemoryMessageChannel::new());
        let scanner = scanner_with_one_due_task(channel.clone(), clock.clone()).await;

        let job = ReminderJob::new(scanner, Schedule::Every(Duration::from_secs(60)), clock);
        let mut group = WorkerGroup::new();
        group.spawn("reminder", move |rx| job.run(rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        group.shutdown_and_join().await;

        assert_eq!(channel.pending("task-reminders"), 2);
    }

    /// Directory that always fails and counts lookups.
    struct BrokenDirectory(AtomicUsize);

    #[async_trait]
    impl UserDirectory for BrokenDirectory {
        async fn find_user(&self, _id: UserId) -> Result<Option<User>, StoreError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("directory down".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_does_not_stop_the_ticker() {
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let store = Arc::new(InMemoryTaskStore::new());
        let mut task = Task::new(TaskId::from_ulid(Ulid::new()), "due", clock.now());
        task.due_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());
        task.user_id = Some(UserId::from_ulid(Ulid::new()));
        store.insert_task(task).await.unwrap();

        let directory = Arc::new(BrokenDirectory(AtomicUsize::new(0)));
        let scanner = Arc::new(ReminderScanner::new(
            store,
            directory.clone(),
            Arc::new(InMemoryMessageChannel::new()),
            clock.clone(),
            "task-reminders",
            100,
        ));

        let job = ReminderJob::new(scanner, Schedule::Every(Duration::from_secs(10)), clock);
        let mut group = WorkerGroup::new();
        group.spawn("reminder", move |rx| job.run(rx));

        tokio::time::sleep(Duration::from_secs(35)).await;
        group.shutdown_and_join().await;

        assert_eq!(directory.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_long_wait() {
        let clock = Arc::new(FixedClock::new(at(9, 0)));
        let channel = Arc::new(InMemoryMessageChannel::new());
        let scanner = scanner_with_one_due_task(channel.clone(), clock.clone()).await;

        let job = ReminderJob::new(scanner, Schedule::default(), clock);
        let mut group = WorkerGroup::new();
        group.spawn("reminder", move |rx| job.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        group.shutdown_and_join().await;
        assert_eq!(channel.pending("task-reminders"), 0);
    }
}
