//! Email delivery.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Classify, ErrorKind};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// The mail server could not be reached or refused temporarily.
    #[error("Mail server unavailable: {0}")]
    Unavailable(String),

    /// The message itself was refused (bad address, policy).
    #[error("Message rejected: {0}")]
    Rejected(String),
}

impl Classify for MailError {
    fn kind(&self) -> ErrorKind {
        match self {
            MailError::Unavailable(_) => ErrorKind::Transient,
            MailError::Rejected(_) => ErrorKind::Permanent,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[async_trait]
impl<T: Mailer + ?Sized> Mailer for Arc<T> {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        (**self).send(message).await
    }
}

#[derive(Default)]
struct MailerState {
    sent: Vec<EmailMessage>,
    attempts: u32,
    fail_next: u32,
    fail_always: Option<MailError>,
}

/// Mailer that keeps sent messages in memory and can be told to fail.
#[derive(Default)]
pub struct InMemoryMailer {
    state: Mutex<MailerState>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `times` sends with [`MailError::Unavailable`].
    pub fn set_fail_times(&self, times: u32) {
        self.state.lock().fail_next = times;
    }

    /// Fails every send with `error` until cleared with `None`.
    pub fn set_failing(&self, error: Option<MailError>) {
        self.state.lock().fail_always = error;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of send calls, successful or not.
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut state = self.state.lock();
        state.attempts += 1;

        if let Some(error) = &state.fail_always {
            return Err(error.clone());
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(MailError::Unavailable("connection refused".to_string()));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        state.sent.push(message.clone());
        Ok(())
    }
}
