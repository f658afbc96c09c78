//! NotificationDispatcher - リマインダーバッチを受け取りメールを送る
//!
//! # 1 メッセージの状態遷移
//! - Received → Rendering → Sent → Acknowledged
//! - Received → Failed（ペイロードが読めない。ack しないので再配送される）
//!
//! # 配送保証
//! - ack は全宛先への送信を試みた後にだけ行う
//! - 宛先単位の送信失敗はログに出してバッチは続行する
//! - ack 失敗時は Sent のまま。チャネルが再配送する（重複送信はありうる）
//! - 読めないペイロードは max_attempts 回目で ack して捨てる

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::template::{REMINDER_SUBJECT, ReminderTemplate};
use crate::domain::ReminderBatch;
use crate::ports::{Delivery, Mailer, MessageId, Subscription};
use crate::worker::shutdown_requested;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchState {
    Received,
    Rendering,
    Sent,
    Acknowledged,
    Failed,
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub message_id: MessageId,
    pub attempt: u32,
    pub state: DispatchState,
    pub recipients: usize,
    pub sent: usize,
    pub send_failures: usize,
    /// Set when the state is `Failed`, or when the ack was rejected.
    pub error: Option<String>,
}

impl DispatchOutcome {
    fn new(delivery: &dyn Delivery) -> Self {
        Self {
            message_id: delivery.message_id(),
            attempt: delivery.attempt(),
            state: DispatchState::Received,
            recipients: 0,
            sent: 0,
            send_failures: 0,
            error: None,
        }
    }
}

pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    template: ReminderTemplate,
    subject: String,
    max_attempts: u32,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, template: ReminderTemplate) -> Self {
        Self {
            mailer,
            template,
            subject: REMINDER_SUBJECT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Process one delivery to completion. Consumes it: either acked or
    /// dropped unacked for redelivery.
    pub async fn handle(&self, delivery: Box<dyn Delivery>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::new(delivery.as_ref());

        let batch = match ReminderBatch::decode(delivery.payload()) {
            Ok(batch) => batch,
            Err(e) => {
                outcome.state = DispatchState::Failed;
                outcome.error = Some(e.to_string());
                if outcome.attempt >= self.max_attempts {
                    tracing::error!(
                        message_id = %outcome.message_id,
                        attempt = outcome.attempt,
                        error = %e,
                        "undecodable reminder batch discarded"
                    );
                    if let Err(ack_err) = delivery.ack().await {
                        tracing::warn!(
                            message_id = %outcome.message_id,
                            error = %ack_err,
                            "discard ack failed"
                        );
                    }
                } else {
                    tracing::warn!(
                        message_id = %outcome.message_id,
                        attempt = outcome.attempt,
                        error = %e,
                        "undecodable reminder batch"
                    );
                }
                return outcome;
            }
        };

        outcome.state = DispatchState::Rendering;
        outcome.recipients = batch.len();
        for record in batch.records() {
            let body = self.template.render(record);
            match self
                .mailer
                .send(&record.recipient_address, &self.subject, &body)
                .await
            {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    outcome.send_failures += 1;
                    tracing::warn!(
                        message_id = %outcome.message_id,
                        task = %record.task_name,
                        error = %e,
                        "reminder mail failed"
                    );
                }
            }
        }
        outcome.state = DispatchState::Sent;

        match delivery.ack().await {
            Ok(()) => outcome.state = DispatchState::Acknowledged,
            Err(e) => {
                tracing::warn!(
                    message_id = %outcome.message_id,
                    error = %e,
                    "ack failed; batch will be redelivered"
                );
                outcome.error = Some(e.to_string());
            }
        }

        tracing::info!(
            message_id = %outcome.message_id,
            attempt = outcome.attempt,
            recipients = outcome.recipients,
            sent = outcome.sent,
            send_failures = outcome.send_failures,
            state = ?outcome.state,
            "reminder batch dispatched"
        );
        outcome
    }

    /// Receive and handle deliveries one at a time until shutdown or until
    /// the subscription closes.
    pub async fn listen(
        self: Arc<Self>,
        subscription: Box<dyn Subscription>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut handled: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delivery = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                delivery = subscription.receive() => delivery,
            };
            let Some(delivery) = delivery else {
                tracing::info!("subscription closed");
                break;
            };
            self.handle(delivery).await;
            handled += 1;
        }
        tracing::info!(handled, "dispatcher stopped");
    }
}
