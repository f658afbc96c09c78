//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。各 trait は外部システム
//! （ドキュメントストア、キャッシュ、メッセージチャネル、メール）への
//! インターフェースで、開発・テスト用の実装は `impls` にあります。

pub mod cache_store;
pub mod clock;
pub mod id_generator;
pub mod mailer;
pub mod message_channel;
pub mod task_store;

pub use self::cache_store::{CacheError, CacheStore};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mailer::{MailError, Mailer};
pub use self::message_channel::{ChannelError, Delivery, MessageChannel, MessageId, Subscription};
pub use self::task_store::{StoreError, TaskStore, UserDirectory};
