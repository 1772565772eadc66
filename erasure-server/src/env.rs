use erasure_common::billing::providers::STRIPE_API_BASE;

use lettre::message::Mailbox;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroize;

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "ERASURE_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "ERASURE_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "ERASURE_DB_HOSTNAME";
const DB_PORT_VAR: &str = "ERASURE_DB_PORT";
const DB_NAME_VAR: &str = "ERASURE_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "ERASURE_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "ERASURE_DB_IDLE_TIMEOUT_SECS";

const CRON_SECRET_VAR: &str = "ERASURE_CRON_SECRET";

const BILLING_ENABLED_VAR: &str = "ERASURE_BILLING_ENABLED";
const STRIPE_SECRET_KEY_VAR: &str = "ERASURE_STRIPE_SECRET_KEY";
const STRIPE_API_BASE_VAR: &str = "ERASURE_STRIPE_API_BASE";
const BILLING_TIMEOUT_SECS_VAR: &str = "ERASURE_BILLING_TIMEOUT_SECS";

const EMAIL_ENABLED_VAR: &str = "ERASURE_EMAIL_ENABLED";
const EMAIL_FROM_ADDR_VAR: &str = "ERASURE_EMAIL_FROM_ADDRESS";
const EMAIL_REPLY_TO_ADDR_VAR: &str = "ERASURE_EMAIL_REPLY_TO_ADDRESS";
const SMTP_ADDRESS_VAR: &str = "ERASURE_SMTP_ADDRESS";
const SMTP_USERNAME_VAR: &str = "ERASURE_SMTP_USERNAME";
const SMTP_PASSWORD_VAR: &str = "ERASURE_SMTP_PASSWORD";
const MAX_SMTP_CONNECTIONS_VAR: &str = "ERASURE_MAX_SMTP_CONNECTIONS";
const SMTP_IDLE_TIMEOUT_SECS_VAR: &str = "ERASURE_SMTP_IDLE_TIMEOUT_SECS";

// Only used when email is disabled and the mock sender keeps the message
const PLACEHOLDER_EMAIL_ADDR: &str = "no-reply@erasure.invalid";

const CLAIM_LEASE_SECS_VAR: &str = "ERASURE_CLAIM_LEASE_SECS";
const MAX_CONCURRENT_USERS_VAR: &str = "ERASURE_MAX_CONCURRENT_USERS";
const SCHEMA_CHECK_ENABLED_VAR: &str = "ERASURE_SCHEMA_CHECK_ENABLED";

const ACTIX_WORKER_COUNT_VAR: &str = "ERASURE_ACTIX_WORKER_COUNT";

const LOG_LEVEL_VAR: &str = "ERASURE_LOG_LEVEL";

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    /// Empty when unset, in which case every cron request is rejected
    pub cron_secret: String,

    pub billing_enabled: bool,
    pub stripe_secret_key: String,
    #[zeroize(skip)]
    pub stripe_api_base: String,
    #[zeroize(skip)]
    pub billing_timeout: Duration,

    pub email_enabled: bool,
    #[zeroize(skip)]
    pub email_from_address: Mailbox,
    #[zeroize(skip)]
    pub email_reply_to_address: Mailbox,
    #[zeroize(skip)]
    pub smtp_address: String,
    pub smtp_username: String,
    pub smtp_password: String,
    #[zeroize(skip)]
    pub max_smtp_connections: u32,
    #[zeroize(skip)]
    pub smtp_idle_timeout: Duration,

    #[zeroize(skip)]
    pub claim_lease: Duration,
    #[zeroize(skip)]
    pub max_concurrent_users: usize,
    pub schema_check_enabled: bool,

    #[zeroize(skip)]
    pub actix_worker_count: usize,

    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let billing_enabled = env_var_or(BILLING_ENABLED_VAR, false);

        let stripe_secret_key = if billing_enabled {
            env_var(STRIPE_SECRET_KEY_VAR)?
        } else {
            env_var_or(STRIPE_SECRET_KEY_VAR, String::new())
        };

        let email_enabled = env_var_or(EMAIL_ENABLED_VAR, false);

        let (email_from_address, smtp_address, smtp_username, smtp_password) = if email_enabled {
            (
                env_var::<String>(EMAIL_FROM_ADDR_VAR)?,
                env_var(SMTP_ADDRESS_VAR)?,
                env_var(SMTP_USERNAME_VAR)?,
                env_var(SMTP_PASSWORD_VAR)?,
            )
        } else {
            (
                env_var_or(EMAIL_FROM_ADDR_VAR, String::from(PLACEHOLDER_EMAIL_ADDR)),
                env_var_or(SMTP_ADDRESS_VAR, String::new()),
                env_var_or(SMTP_USERNAME_VAR, String::new()),
                env_var_or(SMTP_PASSWORD_VAR, String::new()),
            )
        };

        let email_reply_to_address: Mailbox =
            env_var_or(EMAIL_REPLY_TO_ADDR_VAR, email_from_address.clone())
                .parse()
                .map_err(|_| ConfigError::invalid(EMAIL_REPLY_TO_ADDR_VAR))?;
        let email_from_address: Mailbox = email_from_address
            .parse()
            .map_err(|_| ConfigError::invalid(EMAIL_FROM_ADDR_VAR))?;

        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 16),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            cron_secret: env_var_or(CRON_SECRET_VAR, String::new()),

            billing_enabled,
            stripe_secret_key,
            stripe_api_base: env_var_or(STRIPE_API_BASE_VAR, String::from(STRIPE_API_BASE)),
            billing_timeout: Duration::from_secs(env_var_or(BILLING_TIMEOUT_SECS_VAR, 10)),

            email_enabled,
            email_from_address,
            email_reply_to_address,
            smtp_address,
            smtp_username,
            smtp_password,
            max_smtp_connections: env_var_or(MAX_SMTP_CONNECTIONS_VAR, 4),
            smtp_idle_timeout: Duration::from_secs(env_var_or(SMTP_IDLE_TIMEOUT_SECS_VAR, 60)),

            claim_lease: Duration::from_secs(env_var_or(CLAIM_LEASE_SECS_VAR, 900)),
            max_concurrent_users: env_var_or(MAX_CONCURRENT_USERS_VAR, 1),
            schema_check_enabled: env_var_or(SCHEMA_CHECK_ENABLED_VAR, true),

            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),

            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    pub fn database_uri(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_hostname, self.db_port, self.db_name,
        )
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::missing(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::invalid(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl ConfigError {
    fn missing(var_name: &'static str) -> Self {
        Self::MissingVar(var_name)
    }

    fn invalid(var_name: &'static str) -> Self {
        Self::InvalidVar(var_name)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_or_falls_back_on_missing_and_unparsable_values() {
        assert_eq!(env_var_or("ERASURE_TEST_UNSET_VAR", 7u32), 7);

        std::env::set_var("ERASURE_TEST_BAD_NUMBER_VAR", "seven");
        assert_eq!(env_var_or("ERASURE_TEST_BAD_NUMBER_VAR", 7u32), 7);

        std::env::set_var("ERASURE_TEST_GOOD_NUMBER_VAR", "12");
        assert_eq!(env_var_or("ERASURE_TEST_GOOD_NUMBER_VAR", 7u32), 12);
    }

    #[test]
    fn placeholder_email_address_is_a_valid_mailbox() {
        assert!(PLACEHOLDER_EMAIL_ADDR.parse::<Mailbox>().is_ok());
    }

    #[test]
    fn env_var_reports_missing_and_invalid_vars() {
        assert!(matches!(
            env_var::<u16>("ERASURE_TEST_MISSING_PORT_VAR"),
            Err(ConfigError::MissingVar("ERASURE_TEST_MISSING_PORT_VAR"))
        ));

        std::env::set_var("ERASURE_TEST_INVALID_PORT_VAR", "not-a-port");
        assert!(matches!(
            env_var::<u16>("ERASURE_TEST_INVALID_PORT_VAR"),
            Err(ConfigError::InvalidVar("ERASURE_TEST_INVALID_PORT_VAR"))
        ));
    }
}
