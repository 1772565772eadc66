pub mod mock_sender;
pub mod smtp_sender;

pub use mock_sender::MockSender;
pub use smtp_sender::SmtpSender;
