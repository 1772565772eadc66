use async_trait::async_trait;
use lettre::message::Mailbox;
use std::sync::Mutex;

use crate::email::{EmailError, EmailMessage, SendEmail};

#[derive(Clone, Debug)]
pub struct SentEmail {
    pub body: String,
    pub subject: String,
    pub from: Mailbox,
    pub reply_to: Mailbox,
    pub destination: String,
    pub is_html: bool,
}

/// Keeps messages instead of sending them. Used when email is disabled and in
/// tests.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("Lock was poisoned").clone()
    }
}

#[async_trait]
impl SendEmail for MockSender {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError> {
        log::info!("Email disabled; not sending \"{}\"", message.subject);

        self.sent.lock().expect("Lock was poisoned").push(SentEmail {
            body: message.body,
            subject: String::from(message.subject),
            from: message.from,
            reply_to: message.reply_to,
            destination: String::from(message.destination),
            is_html: message.is_html,
        });

        if self.fail {
            return Err(EmailError::RelayConnectionFailed(String::from(
                "Mock sender configured to fail",
            )));
        }

        Ok(())
    }
}
