//! Notification pipeline configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Reminder and fan-out settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Minutes before a booking starts at which its reminder fires
    #[serde(default = "default_reminder_offset")]
    pub reminder_offset_mins: i64,

    /// Seconds between bus subscription attempts
    #[serde(default = "default_subscribe_retry")]
    pub subscribe_retry_secs: u64,
}

impl NotificationConfig {
    pub fn reminder_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reminder_offset_mins)
    }

    pub fn subscribe_retry(&self) -> Duration {
        Duration::from_secs(self.subscribe_retry_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reminder_offset_mins < 0 {
            return Err(ValidationError::InvalidInterval("notifications.reminder_offset_mins"));
        }
        if self.subscribe_retry_secs == 0 {
            return Err(ValidationError::InvalidInterval("notifications.subscribe_retry_secs"));
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            reminder_offset_mins: default_reminder_offset(),
            subscribe_retry_secs: default_subscribe_retry(),
        }
    }
}

fn default_reminder_offset() -> i64 {
    10
}

fn default_subscribe_retry() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotificationConfig::default();
        assert_eq!(config.reminder_offset(), chrono::Duration::minutes(10));
        assert_eq!(config.subscribe_retry(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retry_rejected() {
        let config = NotificationConfig {
            subscribe_retry_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
