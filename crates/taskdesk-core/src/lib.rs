//! taskdesk-core
//!
//! Core of the task-tracking backend: derived-field task queries, a
//! read-through cache with prefix invalidation, and the due-date reminder
//! pipeline (scan → batch → publish → dispatch → ack).
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, status, comment, user, reminder）
//! - **ports**: 外部との境界（TaskStore, CacheStore, MessageChannel, Mailer, Clock, IdGenerator）
//! - **query**: 検索・並び替えのコンパイルとクエリエンジン
//! - **app**: ユースケース（TaskService, ReminderScanner, ReminderJob, NotificationDispatcher）
//! - **impls**: 開発・テスト用の in-memory 実装
//! - **worker**: バックグラウンドループの起動と停止

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod query;
pub mod worker;

pub use crate::config::{Config, ConfigError};
pub use crate::error::{ErrorKind, Result, TaskdeskError};
