//! Executor configuration.
//!
//! Every tunable is a validated newtype so an invalid configuration cannot
//! be constructed, whether it comes from code, a deserialized file or the
//! environment.

use std::time::Duration;

use nutype::nutype;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable read by [`ExecutorConfig::from_env`].
pub const OPERATION_TIMEOUT_ENV: &str = "EVENTGUARD_OPERATION_TIMEOUT_MS";

/// Upper bound on a single Event Log read or append, in milliseconds.
///
/// Validated to be between 10ms and 5 minutes.
#[nutype(
    validate(greater_or_equal = 10, less_or_equal = 300_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct OperationTimeoutMs(u64);

impl OperationTimeoutMs {
    /// Convert to Duration for use with `tokio::time::timeout`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but is not a number.
    #[error("{variable} must be an integer number of milliseconds, got '{value}'")]
    NotANumber {
        /// Offending variable.
        variable: &'static str,
        /// Raw value.
        value: String,
    },
    /// A variable is a number outside the permitted range.
    #[error("{variable} is out of range: {source}")]
    OutOfRange {
        /// Offending variable.
        variable: &'static str,
        /// Validation failure.
        #[source]
        source: OperationTimeoutMsError,
    },
}

/// Configuration of a [`CommandExecutor`](crate::CommandExecutor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Limit on each read and append. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout: Option<OperationTimeoutMs>,
}

impl ExecutorConfig {
    /// Configuration with no timeouts.
    pub const fn new() -> Self {
        Self {
            operation_timeout: None,
        }
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: OperationTimeoutMs) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Loads configuration from the process environment.
    ///
    /// An unset variable leaves the corresponding setting at its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let operation_timeout = lookup(OPERATION_TIMEOUT_ENV)
            .map(|raw| parse_timeout(OPERATION_TIMEOUT_ENV, &raw))
            .transpose()?;

        Ok(Self { operation_timeout })
    }
}

fn parse_timeout(variable: &'static str, raw: &str) -> Result<OperationTimeoutMs, ConfigError> {
    let millis = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::NotANumber {
            variable,
            value: raw.to_string(),
        })?;

    OperationTimeoutMs::try_new(millis).map_err(|source| ConfigError::OutOfRange { variable, source })
}
