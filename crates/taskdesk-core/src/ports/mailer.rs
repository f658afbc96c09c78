//! Mailer port - メール送信（外部呼び出し、失敗しうる）

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("mail to {address} failed: {reason}")]
pub struct MailError {
    pub address: String,
    pub reason: String,
}

impl MailError {
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
