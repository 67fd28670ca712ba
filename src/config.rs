use serde::{Deserialize, Serialize};

use crate::utils::get_env_with_prefix;

/// Main configuration for the Pawpass engine
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Settings for the subscription lifecycle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    /// Days before expiry at which a subscription counts as expiring soon
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: default_expiring_soon_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_expiring_soon_days() -> u32 {
    7
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_billing(mut self, billing: BillingConfig) -> Self {
        self.config.billing = billing;
        self
    }

    /// Set how many days before expiry a subscription is flagged as expiring soon
    pub fn with_expiring_soon_days(mut self, days: u32) -> Self {
        self.config.billing.expiring_soon_days = days;
        self
    }

    /// Load configuration from environment variables with PAWPASS_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(days) = get_env_with_prefix("EXPIRING_SOON_DAYS") {
            if let Ok(d) = days.parse() {
                self.config.billing.expiring_soon_days = d;
            }
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Invalid log level
    /// - Zero-day expiring soon window
    pub fn build(self) -> crate::error::Result<Config> {
        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(crate::error::PawpassError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.billing.expiring_soon_days == 0 {
            return Err(crate::error::PawpassError::bad_request(
                "Expiring soon window must be at least 1 day",
            ));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
