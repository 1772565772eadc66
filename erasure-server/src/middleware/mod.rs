pub mod cron_secret;

pub use cron_secret::{CronAuthorized, CronSecret};
