//! Mailer 実装
//!
//! - **LogMailer**: 送信せず tracing に出すだけ（CLI の既定）
//! - **RecordingMailer**: 送信内容を記録する。宛先単位で失敗させられる

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{MailError, Mailer};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(to = address, subject, bytes = body.len(), "mail sent");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later send to `address` fails.
    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(address.to_string());
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.address == address)
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let refused = self
            .failing
            .lock()
            .map(|f| f.contains(address))
            .unwrap_or(false);
        if refused {
            return Err(MailError::new(address, "mailbox unavailable"));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::new(address, "recorder poisoned"))?;
        sent.push(SentMail {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
