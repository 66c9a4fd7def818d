use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{
    AppError, ErrorKind, DEFAULT_FLIGHT_WINDOW, DEFAULT_HIGHLIGHT_MS,
    DEFAULT_LIVENESS_INTERVAL_MS, DEFAULT_RESET_REDIRECT, MAX_FLIGHT_WINDOW,
    MIN_LIVENESS_INTERVAL_MS,
};

/// Runtime settings handed over by the shell on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upcoming flights shown at most.
    pub flight_window_limit: usize,
    pub liveness_interval_ms: u64,
    pub password_reset_redirect: String,
    pub highlight_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flight_window_limit: DEFAULT_FLIGHT_WINDOW,
            liveness_interval_ms: DEFAULT_LIVENESS_INTERVAL_MS,
            password_reset_redirect: DEFAULT_RESET_REDIRECT.to_string(),
            highlight_ms: DEFAULT_HIGHLIGHT_MS,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("flight_window_limit must be between 1 and {max}, got {value}")]
    FlightWindow { value: usize, max: usize },

    #[error("liveness_interval_ms must be at least {min}, got {value}")]
    LivenessInterval { value: u64, min: u64 },

    #[error("password_reset_redirect is not an absolute http(s) URL: {value}")]
    RedirectUrl { value: String },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, err.to_string())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FLIGHT_WINDOW).contains(&self.flight_window_limit) {
            return Err(ConfigError::FlightWindow {
                value: self.flight_window_limit,
                max: MAX_FLIGHT_WINDOW,
            });
        }
        if self.liveness_interval_ms < MIN_LIVENESS_INTERVAL_MS {
            return Err(ConfigError::LivenessInterval {
                value: self.liveness_interval_ms,
                min: MIN_LIVENESS_INTERVAL_MS,
            });
        }
        let redirect_ok = Url::parse(&self.password_reset_redirect)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        if !redirect_ok {
            return Err(ConfigError::RedirectUrl {
                value: self.password_reset_redirect.clone(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn liveness_interval(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.liveness_interval_ms).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn highlight_duration(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.highlight_ms).unwrap_or(i64::MAX))
    }
}
