//! InMemoryMessageChannel - 開発用のメッセージチャネル
//!
//! # 実装詳細
//! - topic ごとに pending (VecDeque) と in_flight (HashMap) を持つ
//! - receive で pending → in_flight に移し、attempt を 1 増やす
//! - ack で in_flight から消える
//! - ack されずに drop された配送は pending の末尾に戻る（再配送）
//! - 待機は Notify。enable してから中身を確認するので取りこぼさない
//!
//! 同一 topic を複数の Subscription で受けると、競合コンシューマになる。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::ports::{ChannelError, Delivery, MessageChannel, MessageId, Subscription};

#[derive(Clone)]
struct Message {
    id: MessageId,
    payload: Vec<u8>,
    attempt: u32,
}

#[derive(Default)]
struct TopicState {
    pending: VecDeque<Message>,
    in_flight: HashMap<MessageId, Message>,
}

#[derive(Default)]
struct ChannelState {
    topics: HashMap<String, TopicState>,
    closed: bool,
    failing_acks: u32,
}

#[derive(Default)]
struct Shared {
    state: Mutex<ChannelState>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, ChannelState>, ChannelError> {
        self.state.lock().map_err(|_| ChannelError::Closed)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryMessageChannel {
    shared: Arc<Shared>,
}

impl InMemoryMessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting publishes and wake every waiting receiver.
    /// Messages still pending stay readable.
    pub fn close(&self) {
        if let Ok(mut state) = self.shared.lock() {
            state.closed = true;
        }
        self.shared.notify.notify_waiters();
    }

    /// Make the next `n` acks fail. Those deliveries are redelivered.
    pub fn fail_next_acks(&self, n: u32) {
        if let Ok(mut state) = self.shared.lock() {
            state.failing_acks = n;
        }
    }

    /// Messages waiting to be received on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .ok()
            .and_then(|s| s.topics.get(topic).map(|t| t.pending.len()))
            .unwrap_or(0)
    }

    /// Messages received on `topic` but not yet acked.
    pub fn in_flight(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .ok()
            .and_then(|s| s.topics.get(topic).map(|t| t.in_flight.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageChannel for InMemoryMessageChannel {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<MessageId, ChannelError> {
        let id = MessageId::new();
        {
            let mut state = self.shared.lock()?;
            if state.closed {
                return Err(ChannelError::Publish {
                    topic: topic.to_string(),
                    reason: "channel closed".into(),
                });
            }
            state
                .topics
                .entry(topic.to_string())
                .or_default()
                .pending
                .push_back(Message {
                    id,
                    payload,
                    attempt: 0,
                });
        }
        self.shared.notify.notify_waiters();
        Ok(id)
    }

    fn subscribe(&self, topic: &str) -> Box<dyn Subscription> {
        Box::new(InMemorySubscription {
            shared: self.shared.clone(),
            topic: topic.to_string(),
        })
    }
}

pub(crate) struct InMemorySubscription {
    shared: Arc<Shared>,
    topic: String,
}

impl InMemorySubscription {
    fn try_take(&self) -> Option<InMemoryDelivery> {
        let mut state = self.shared.lock().ok()?;
        let topic = state.topics.get_mut(&self.topic)?;
        let mut message = topic.pending.pop_front()?;
        message.attempt += 1;
        topic.in_flight.insert(message.id, message.clone());
        Some(InMemoryDelivery {
            shared: self.shared.clone(),
            topic: self.topic.clone(),
            message,
            settled: false,
        })
    }

    fn is_closed(&self) -> bool {
        self.shared.lock().map(|s| s.closed).unwrap_or(true)
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn receive(&self) -> Option<Box<dyn Delivery>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_take() {
                return Some(Box::new(delivery));
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }
}

pub(crate) struct InMemoryDelivery {
    shared: Arc<Shared>,
    topic: String,
    message: Message,
    settled: bool,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn message_id(&self) -> MessageId {
        self.message.id
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn attempt(&self) -> u32 {
        self.message.attempt
    }

    async fn ack(mut self: Box<Self>) -> Result<(), ChannelError> {
        let mut state = self.shared.lock()?;
        if state.failing_acks > 0 {
            state.failing_acks -= 1;
            return Err(ChannelError::Ack {
                message_id: self.message.id,
                reason: "ack rejected".into(),
            });
        }
        if let Some(topic) = state.topics.get_mut(&self.topic) {
            topic.in_flight.remove(&self.message.id);
        }
        drop(state);
        self.settled = true;
        Ok(())
    }
}

impl Drop for InMemoryDelivery {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if let Some(topic) = state.topics.get_mut(&self.topic)
            && let Some(message) = topic.in_flight.remove(&self.message.id)
        {
            tracing::debug!(
                message_id = %message.id,
                attempt = message.attempt,
                topic = %self.topic,
                "unacked delivery returned to queue"
            );
            topic.pending.push_back(message);
        }
        drop(state);
        self.shared.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_receive_ack() {
        let channel = InMemoryMessageChannel::new();
        let sub = channel.subscribe("reminders");

        let id = channel.publish("reminders", b"hello".to_vec()).await.unwrap();
        let delivery = sub.receive().await.unwrap();

        assert_eq!(delivery.message_id(), id);
        assert_eq!(delivery.payload(), b"hello");
        assert_eq!(delivery.attempt(), 1);
        assert_eq!(channel.in_flight("reminders"), 1);

        delivery.ack().await.unwrap();
        assert_eq!(channel.in_flight("reminders"), 0);
        assert_eq!(channel.pending("reminders"), 0);
    }

    #[tokio::test]
    async fn dropped_delivery_is_redelivered() {
        let channel = InMemoryMessageChannel::new();
        let sub = channel.subscribe("reminders");
        let id = channel.publish("reminders", b"x".to_vec()).await.unwrap();

        drop(sub.receive().await.unwrap());

        let again = sub.receive().await.unwrap();
        assert_eq!(again.message_id(), id);
        assert_eq!(again.attempt(), 2);
        again.ack().await.unwrap();
    }

    #[tokio::test]
    async fn failed_ack_is_redelivered() {
        let channel = InMemoryMessageChannel::new();
        let sub = channel.subscribe("reminders");
        channel.publish("reminders", b"x".to_vec()).await.unwrap();
        channel.fail_next_acks(1);

        let first = sub.receive().await.unwrap();
        assert!(matches!(first.ack().await, Err(ChannelError::Ack { .. })));

        let second = sub.receive().await.unwrap();
        assert_eq!(second.attempt(), 2);
        second.ack().await.unwrap();
        assert_eq!(channel.pending("reminders"), 0);
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let channel = InMemoryMessageChannel::new();
        channel.publish("a", b"1".to_vec()).await.unwrap();
        channel.publish("b", b"2".to_vec()).await.unwrap();

        let b = channel.subscribe("b").receive().await.unwrap();
        assert_eq!(b.payload(), b"2");
        assert_eq!(channel.pending("a"), 1);
        b.ack().await.unwrap();
    }

    #[tokio::test]
    async fn publish_wakes_receiver() {
        let channel = InMemoryMessageChannel::new();
        let sub = channel.subscribe("t");

        let waiter = tokio::spawn(async move {
            let d = sub.receive().await.unwrap();
            let payload = d.payload().to_vec();
            d.ack().await.unwrap();
            payload
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        channel.publish("t", b"late".to_vec()).await.unwrap();

        assert_eq!(waiter.await.unwrap(), b"late".to_vec());
    }

    #[tokio::test]
    async fn close_ends_receive_and_rejects_publish() {
        let channel = InMemoryMessageChannel::new();
        let sub = channel.subscribe("t");

        let waiter = tokio::spawn(async move { sub.receive().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.close();

        assert!(waiter.await.unwrap());
        assert!(matches!(
            channel.publish("t", vec![]).await,
            Err(ChannelError::Publish { .. })
        ));
    }
}
