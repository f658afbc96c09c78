//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: TaskStore + UserDirectory の正本
//! - **InMemoryCacheStore**: TTL なしのキャッシュ
//! - **InMemoryMessageChannel**: at-least-once のトピック配送
//! - **LogMailer / RecordingMailer**: メール送信
//!
//! # 本番用実装
//! ドキュメントストア・Redis・Pub/Sub・SMTP の実装は別クレートに置く想定。

pub mod inmem_cache;
pub mod inmem_channel;
pub mod inmem_store;
pub mod mailer;

pub use self::inmem_cache::InMemoryCacheStore;
pub use self::inmem_channel::InMemoryMessageChannel;
pub use self::inmem_store::InMemoryTaskStore;
pub use self::mailer::{LogMailer, RecordingMailer, SentMail};
