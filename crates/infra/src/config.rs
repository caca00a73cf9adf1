//! Runtime configuration loaded from the environment.
//!
//! Every value has a default; a variable that is set but malformed is an
//! error rather than a silent fallback.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use assetbook_accounting::DepreciationAccounts;

pub const ENV_MAX_CONCURRENCY: &str = "ASSETBOOK_MAX_CONCURRENCY";
pub const ENV_BATCH_TIMEOUT_SECS: &str = "ASSETBOOK_BATCH_TIMEOUT_SECS";
pub const ENV_DEFAULT_NOTE: &str = "ASSETBOOK_DEFAULT_NOTE";
pub const ENV_EXPENSE_ACCOUNT: &str = "ASSETBOOK_EXPENSE_ACCOUNT";
pub const ENV_ACCUMULATED_ACCOUNT: &str = "ASSETBOOK_ACCUMULATED_ACCOUNT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Source of configuration values, keyed by variable name.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Parse `key` from `source`, falling back to `default` when unset.
pub fn parse_or<T, S>(source: &S, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    S: ConfigSource + ?Sized,
{
    match source.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
    }
}

/// Depreciation runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Assets processed in parallel. One asset is always sequential.
    pub max_concurrency: usize,
    /// After this long no new asset is scheduled; in-flight ones finish.
    pub batch_timeout: Duration,
    /// Note stamped on new records when the request carries none.
    pub default_note: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            batch_timeout: Duration::from_secs(300),
            default_note: "Monthly depreciation".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_concurrency = parse_or(source, ENV_MAX_CONCURRENCY, defaults.max_concurrency)?;
        if max_concurrency == 0 {
            return Err(ConfigError::invalid(
                ENV_MAX_CONCURRENCY,
                "0",
                "must be at least 1",
            ));
        }
        let timeout_secs = parse_or(
            source,
            ENV_BATCH_TIMEOUT_SECS,
            defaults.batch_timeout.as_secs(),
        )?;

        Ok(Self {
            max_concurrency,
            batch_timeout: Duration::from_secs(timeout_secs),
            default_note: source.get(ENV_DEFAULT_NOTE).unwrap_or(defaults.default_note),
        })
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_default_note(mut self, note: impl Into<String>) -> Self {
        self.default_note = note.into();
        self
    }
}

/// General-ledger accounts used by the posting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingConfig {
    pub expense_account: String,
    pub accumulated_account: String,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            expense_account: "6100".to_string(),
            accumulated_account: "1590".to_string(),
        }
    }
}

impl PostingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let account = |key: &str, default: String| -> Result<String, ConfigError> {
            match source.get(key) {
                None => Ok(default),
                Some(code) if code.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                    Ok(code.trim().to_string())
                }
                Some(code) => Err(ConfigError::invalid(key, &code, "not an account code")),
            }
        };

        Ok(Self {
            expense_account: account(ENV_EXPENSE_ACCOUNT, defaults.expense_account)?,
            accumulated_account: account(ENV_ACCUMULATED_ACCOUNT, defaults.accumulated_account)?,
        })
    }

    pub fn accounts(&self) -> DepreciationAccounts {
        DepreciationAccounts::new(&self.expense_account, &self.accumulated_account)
    }
}
