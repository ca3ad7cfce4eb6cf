use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::event::LogLevel;

pub const MAX_DECIMAL_PLACES: u8 = 6;
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// When a completed task that is neither kept alive nor pinned to a slot leaves the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalDelay {
    /// Once this much time has passed since the task's last update.
    After(Duration),
    /// After this many render ticks spent completed.
    AfterTicks(u32),
    Never,
}

/// The active configuration. Always replaced as a whole, never field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub permanent_progressbar_slots: usize,
    pub message_number: usize,
    pub exception_number: usize,
    pub task_removal_delay: RemovalDelay,
    pub decimal_places: u8,
    pub refresh_interval: Duration,
    pub display_level: LogLevel,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            permanent_progressbar_slots: 0,
            message_number: 20,
            exception_number: 0,
            task_removal_delay: RemovalDelay::After(Duration::from_millis(500)),
            decimal_places: 0,
            refresh_interval: Duration::from_millis(100),
            display_level: LogLevel::Info,
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_decimal_places(self.decimal_places)?;
        check_refresh_interval(self.refresh_interval)
    }

    /// Returns a copy with every field the change names replaced.
    pub fn with_change(&self, change: &ConfigChange) -> Configuration {
        Configuration {
            permanent_progressbar_slots: change
                .permanent_progressbar_slots
                .unwrap_or(self.permanent_progressbar_slots),
            message_number: change.message_number.unwrap_or(self.message_number),
            exception_number: change.exception_number.unwrap_or(self.exception_number),
            task_removal_delay: change.task_removal_delay.unwrap_or(self.task_removal_delay),
            decimal_places: change.decimal_places.unwrap_or(self.decimal_places),
            refresh_interval: change.refresh_interval.unwrap_or(self.refresh_interval),
            display_level: change.display_level.unwrap_or(self.display_level),
        }
    }
}

/// A partial configuration, as passed to `set_configuration`. Unset fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigChange {
    pub permanent_progressbar_slots: Option<usize>,
    pub message_number: Option<usize>,
    pub exception_number: Option<usize>,
    pub task_removal_delay: Option<RemovalDelay>,
    pub decimal_places: Option<u8>,
    pub refresh_interval: Option<Duration>,
    pub display_level: Option<LogLevel>,
}

impl ConfigChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permanent_progressbar_slots(mut self, slots: usize) -> Self {
        self.permanent_progressbar_slots = Some(slots);
        self
    }

    pub fn message_number(mut self, number: usize) -> Self {
        self.message_number = Some(number);
        self
    }

    pub fn exception_number(mut self, number: usize) -> Self {
        self.exception_number = Some(number);
        self
    }

    pub fn task_removal_delay(mut self, delay: RemovalDelay) -> Self {
        self.task_removal_delay = Some(delay);
        self
    }

    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = Some(places);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn display_level(mut self, level: LogLevel) -> Self {
        self.display_level = Some(level);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(places) = self.decimal_places {
            check_decimal_places(places)?;
        }
        if let Some(interval) = self.refresh_interval {
            check_refresh_interval(interval)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("refresh interval must be positive")]
    ZeroRefreshInterval,
    #[error("refresh interval {0:?} exceeds the maximum of {max:?}", max = MAX_REFRESH_INTERVAL)]
    RefreshIntervalTooLong(Duration),
    #[error("{0} decimal places requested, at most {max} are supported", max = MAX_DECIMAL_PLACES)]
    TooManyDecimalPlaces(u8),
}

fn check_decimal_places(places: u8) -> Result<(), ConfigError> {
    if places > MAX_DECIMAL_PLACES {
        return Err(ConfigError::TooManyDecimalPlaces(places));
    }
    Ok(())
}

fn check_refresh_interval(interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::ZeroRefreshInterval);
    }
    if interval > MAX_REFRESH_INTERVAL {
        return Err(ConfigError::RefreshIntervalTooLong(interval));
    }
    Ok(())
}
