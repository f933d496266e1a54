//! Outbound mail port and the in-process suppressed implementation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address `{address}`: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that never touches the network.
///
/// Messages are only logged unless the mailer was built with
/// [`SuppressedMailer::recording`], which also keeps them for inspection.
#[derive(Debug, Clone, Default)]
pub struct SuppressedMailer {
    outbox: Option<Arc<Mutex<Vec<OutgoingMail>>>>,
}

impl SuppressedMailer {
    /// Log-only mailer; nothing is retained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailer that keeps every accepted message.
    pub fn recording() -> Self {
        Self {
            outbox: Some(Arc::default()),
        }
    }

    /// Messages accepted so far, oldest first. Always empty unless recording.
    pub fn outbox(&self) -> Vec<OutgoingMail> {
        match &self.outbox {
            Some(outbox) => match outbox.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            },
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Mailer for SuppressedMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(
            target = "storefront::mail",
            to = %mail.to,
            subject = %mail.subject,
            "mail suppressed"
        );
        if let Some(outbox) = &self.outbox {
            match outbox.lock() {
                Ok(mut guard) => guard.push(mail),
                Err(poisoned) => poisoned.into_inner().push(mail),
            }
        }
        Ok(())
    }
}
