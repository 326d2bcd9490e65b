use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::queue::{ChangeKind, QueueOrder};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);
pub const MAX_CALL_ATTEMPTS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("refresh_interval must be > 0")]
    ZeroRefreshInterval,

    #[error("call timeout must be > 0")]
    ZeroTimeout,

    #[error("max_attempts must be between 1 and {max}, got {got}")]
    Attempts { got: u32, max: u32 },
}

/// What a failed mutation leaves behind in the request status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationErrorPolicy {
    /// Failed deletes set an error; failed adds and updates are logged and
    /// the store returns to idle.
    #[default]
    SurfaceDeletes,
    /// Every failed mutation sets an error that must be cleared explicitly.
    SurfaceAll,
    /// No failed mutation sets an error; all of them are only logged.
    Silent,
}

impl MutationErrorPolicy {
    pub fn surfaces(self, kind: ChangeKind) -> bool {
        match self {
            MutationErrorPolicy::SurfaceDeletes => kind == ChangeKind::Delete,
            MutationErrorPolicy::SurfaceAll => true,
            MutationErrorPolicy::Silent => false,
        }
    }
}

/// Timeout and bounded retry applied around every backend call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPolicy {
    pub timeout: Duration,
    /// Total attempts per dispatch, first one included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            max_attempts: 1,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl CallPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_CALL_ATTEMPTS {
            return Err(ConfigError::Attempts {
                got: self.max_attempts,
                max: MAX_CALL_ATTEMPTS,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `None` disables background refreshing.
    pub refresh_interval: Option<Duration>,
    pub queue_order: QueueOrder,
    pub error_policy: MutationErrorPolicy,
    pub call: CallPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL),
            queue_order: QueueOrder::default(),
            error_policy: MutationErrorPolicy::default(),
            call: CallPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        self.call.validate()
    }

    pub fn without_refresh(mut self) -> Self {
        self.refresh_interval = None;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn with_error_policy(mut self, policy: MutationErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    pub fn with_call_policy(mut self, call: CallPolicy) -> Self {
        self.call = call;
        self
    }
}
