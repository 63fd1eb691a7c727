//! Process configuration.
//!
//! Everything a pass needs is carried in `Config` and handed to the driver;
//! nothing is read from the environment after startup.

use std::env;
use std::time::Duration;

use crate::domain::{RedeliverError, RetryPolicy};
use crate::impls::sendgrid::DEFAULT_BASE_URL;
use crate::ports::NotifyTarget;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub provider_base_url: String,
    pub database_url: String,

    /// Length of the trailing polling window.
    pub window: chrono::Duration,
    pub poll_limit: u32,
    pub policy: RetryPolicy,
    pub notify_target: NotifyTarget,
    /// Fetch a bounce reason and include it in the notice.
    pub enrich: bool,
    /// End the pass when polling fails instead of reconciling stored rows.
    pub require_ingest: bool,

    pub http_timeout: Duration,
    pub pass_deadline: Duration,
    /// Delay between passes in loop mode.
    pub interval: Duration,
}

impl Config {
    pub const DEFAULT_WINDOW_MINUTES: i64 = 60;
    pub const DEFAULT_POLL_LIMIT: u32 = 200;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_PASS_DEADLINE_SECS: u64 = 300;
    pub const DEFAULT_INTERVAL_SECS: u64 = 900;

    /// Defaults for everything but credentials.
    pub fn new(api_key: impl Into<String>, database_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            provider_base_url: DEFAULT_BASE_URL.to_string(),
            database_url: database_url.into(),
            window: chrono::Duration::minutes(Self::DEFAULT_WINDOW_MINUTES),
            poll_limit: Self::DEFAULT_POLL_LIMIT,
            policy: RetryPolicy::default(),
            notify_target: NotifyTarget::OriginalRecipient,
            enrich: false,
            require_ingest: false,
            http_timeout: Duration::from_secs(Self::DEFAULT_HTTP_TIMEOUT_SECS),
            pass_deadline: Duration::from_secs(Self::DEFAULT_PASS_DEADLINE_SECS),
            interval: Duration::from_secs(Self::DEFAULT_INTERVAL_SECS),
        }
    }

    pub fn from_env() -> Result<Self, RedeliverError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source (`from_env` uses the process env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RedeliverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| RedeliverError::Config(format!("{key} must be set")))
        };

        let mut config = Self::new(require("SENDGRID_API_KEY")?, require("DATABASE_URL")?);

        if let Some(url) = get("SENDGRID_BASE_URL") {
            config.provider_base_url = url;
        }
        if let Some(minutes) = parse::<i64>("REDELIVER_WINDOW_MINUTES", get("REDELIVER_WINDOW_MINUTES"))? {
            config.window = chrono::Duration::minutes(minutes);
        }
        if let Some(limit) = parse("REDELIVER_POLL_LIMIT", get("REDELIVER_POLL_LIMIT"))? {
            config.poll_limit = limit;
        }
        if let Some(max) = parse("REDELIVER_MAX_ATTEMPTS", get("REDELIVER_MAX_ATTEMPTS"))? {
            config.policy = RetryPolicy::new(max);
        }
        if let Some(address) = get("REDELIVER_OPERATOR_ADDRESS") {
            config.notify_target = NotifyTarget::Operator(address);
        }
        if let Some(enrich) = parse_flag("REDELIVER_ENRICH", get("REDELIVER_ENRICH"))? {
            config.enrich = enrich;
        }
        if let Some(required) = parse_flag("REDELIVER_REQUIRE_INGEST", get("REDELIVER_REQUIRE_INGEST"))? {
            config.require_ingest = required;
        }
        if let Some(secs) = parse("REDELIVER_HTTP_TIMEOUT_SECS", get("REDELIVER_HTTP_TIMEOUT_SECS"))? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse("REDELIVER_PASS_DEADLINE_SECS", get("REDELIVER_PASS_DEADLINE_SECS"))? {
            config.pass_deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = parse("REDELIVER_INTERVAL_SECS", get("REDELIVER_INTERVAL_SECS"))? {
            config.interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RedeliverError> {
        if self.window <= chrono::Duration::zero() {
            return Err(RedeliverError::Config("window must be positive".into()));
        }
        if self.poll_limit == 0 {
            return Err(RedeliverError::Config("poll limit must be positive".into()));
        }
        if self.policy.max_attempts == 0 {
            return Err(RedeliverError::Config("max attempts must be positive".into()));
        }
        if self.pass_deadline.is_zero() || self.http_timeout.is_zero() {
            return Err(RedeliverError::Config("timeouts must be positive".into()));
        }
        if let NotifyTarget::Operator(address) = &self.notify_target
            && !address.contains('@')
        {
            return Err(RedeliverError::Config(format!(
                "operator address {address:?} is not an email address"
            )));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, RedeliverError>
where
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|e| RedeliverError::Config(format!("{key}={v:?}: {e}")))
    })
    .transpose()
}

fn parse_flag(key: &str, raw: Option<String>) -> Result<Option<bool>, RedeliverError> {
    raw.map(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RedeliverError::Config(format!("{key}={v:?} is not a boolean"))),
    })
    .transpose()
}
