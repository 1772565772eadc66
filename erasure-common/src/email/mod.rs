pub mod senders;
pub mod templates;

use async_trait::async_trait;
use lettre::message::Mailbox;
use std::fmt;
use std::sync::Arc;

use crate::email::templates::DeletionCompleteMessage;

#[derive(Debug)]
pub enum EmailError {
    RelayConnectionFailed(String),
    InvalidDestination,
    InvalidMessage(lettre::error::Error),
    FailedToSend(lettre::transport::smtp::Error),
}

impl std::error::Error for EmailError {}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::RelayConnectionFailed(e) => {
                write!(f, "EmailError: Relay connection failed: {e}")
            }
            EmailError::InvalidDestination => write!(f, "EmailError: Invalid destination address"),
            EmailError::InvalidMessage(e) => write!(f, "EmailError: Invalid message {e}"),
            EmailError::FailedToSend(e) => write!(f, "EmailError: Failed to send: {e}"),
        }
    }
}

#[derive(Debug)]
pub struct EmailMessage<'a> {
    pub body: String,
    pub subject: &'a str,
    pub from: Mailbox,
    pub reply_to: Mailbox,
    pub destination: &'a str,
    pub is_html: bool,
}

#[async_trait]
pub trait SendEmail: Send + Sync {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError>;
}

pub const DELETION_COMPLETE_SUBJECT: &str = "Your account has been deleted";

/// Tells a user their account is gone. Sending is best-effort: the erasure has
/// already committed, so a failure is only logged.
#[derive(Clone)]
pub struct DeletionNotifier {
    sender: Arc<dyn SendEmail>,
    from: Mailbox,
    reply_to: Mailbox,
}

impl DeletionNotifier {
    pub fn new(sender: Arc<dyn SendEmail>, from: Mailbox, reply_to: Mailbox) -> Self {
        Self {
            sender,
            from,
            reply_to,
        }
    }

    pub async fn notify(&self, user_id: &str, user_email: &str) {
        let message = EmailMessage {
            body: DeletionCompleteMessage::generate(user_email),
            subject: DELETION_COMPLETE_SUBJECT,
            from: self.from.clone(),
            reply_to: self.reply_to.clone(),
            destination: user_email,
            is_html: true,
        };

        match self.sender.send(message).await {
            Ok(()) => log::info!("Sent deletion notice for user {user_id}"),
            Err(e) => log::warn!("Failed to send deletion notice for user {user_id}: {e}"),
        }
    }
}
