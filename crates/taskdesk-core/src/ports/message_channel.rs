//! MessageChannel port - トピック単位の publish / subscribe
//!
//! 配送は at-least-once です。
//! - ack されなかった配送（ack 失敗・ack 前に drop）は再配送される
//! - 重複排除はしない（同じバッチが二度届くことはありうる）

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("ack of message {message_id} failed: {reason}")]
    Ack { message_id: MessageId, reason: String },

    #[error("channel closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Ulid);

impl MessageId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, ChannelError>;

    /// Attach a consumer to `topic`. Consumers of the same topic compete
    /// for messages.
    fn subscribe(&self, topic: &str) -> Box<dyn Subscription>;
}

/// Receiving side of one subscription.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Wait for the next delivery. `None` once the channel is closed.
    async fn receive(&self) -> Option<Box<dyn Delivery>>;
}

/// One delivery of a message. The consumer owns it and must `ack` it;
/// anything else leaves the message eligible for redelivery.
#[async_trait]
pub trait Delivery: Send {
    fn message_id(&self) -> MessageId;

    fn payload(&self) -> &[u8];

    /// 1 on first delivery, incremented on every redelivery.
    fn attempt(&self) -> u32;

    async fn ack(self: Box<Self>) -> Result<(), ChannelError>;
}
