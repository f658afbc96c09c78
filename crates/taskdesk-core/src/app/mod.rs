//! App - アプリケーション層
//!
//! ports を組み合わせてユースケースを実装します。
//!
//! # 主要コンポーネント
//! - **TaskService**: タスクの書き込みとキャッシュ付き読み出し
//! - **ReadThroughCache**: 名前空間単位の無効化つきキャッシュ
//! - **ReminderScanner**: 翌日期限タスクのスキャンとバッチ publish
//! - **ReminderJob**: スキャナを定期起動するティッカー
//! - **NotificationDispatcher**: バッチを受けてメール送信・ack

pub mod cache;
pub mod dispatcher;
pub mod reminder_scan;
pub mod scheduler;
pub mod task_service;
pub mod template;

pub use self::cache::{CacheNamespace, ReadThroughCache};
pub use self::dispatcher::{
    DEFAULT_MAX_ATTEMPTS, DispatchOutcome, DispatchState, NotificationDispatcher,
};
pub use self::reminder_scan::{ReminderScanner, ScanReport};
pub use self::scheduler::{ReminderJob, Schedule};
pub use self::task_service::{PrioritySummary, TaskService};
pub use self::template::{ASSIGNMENT_SUBJECT, REMINDER_SUBJECT, ReminderTemplate, assignment_body};
