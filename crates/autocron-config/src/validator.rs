//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// A problem found in the configuration.
#[derive(Debug)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(path, message));
    }

    pub fn add_warning(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(path, message));
    }

    /// The warnings, or the first error as a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationIssue>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(issue) => Err(ConfigError::InvalidValue {
                field: issue.path,
                message: issue.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_store(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_constraints(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.path.as_os_str().is_empty() {
            result.add_error("store.path", "must not be empty");
        } else if config.store.path.is_dir() {
            result.add_error("store.path", "points at a directory");
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;
        if scheduler.inexact_window_secs == 0 {
            result.add_warning(
                "scheduler.inexact_window_secs",
                "0 makes every alarm exact",
            );
        }
        if scheduler.alarm_granularity_secs > scheduler.inexact_window_secs {
            result.add_warning(
                "scheduler.alarm_granularity_secs",
                "larger than the inexact window; alignment will be capped",
            );
        }
    }

    fn validate_constraints(config: &Config, result: &mut ValidationResult) {
        let constraints = &config.constraints;
        if constraints.poll_interval_secs == 0 {
            result.add_error("constraints.poll_interval_secs", "must be greater than 0");
        }
        if constraints.battery_low_percent > 100 {
            result.add_error("constraints.battery_low_percent", "must be between 0 and 100");
        }
        if constraints.storage_low_percent > 100 {
            result.add_error("constraints.storage_low_percent", "must be between 0 and 100");
        }
        if constraints.idle_load_threshold < 0.0 {
            result.add_error("constraints.idle_load_threshold", "must not be negative");
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        let level = config.logging.level.to_ascii_lowercase();
        // Directive strings like "autocron=debug" are passed through.
        if !level.contains('=') && !LEVELS.contains(&level.as_str()) {
            result.add_warning(
                "logging.level",
                format!("unknown level '{}', falling back to info", config.logging.level),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::validate(&Config::default());
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_zero_poll_interval_is_error() {
        let mut config = Config::default();
        config.constraints.poll_interval_secs = 0;
        let result = ConfigValidator::validate(&config);
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].path, "constraints.poll_interval_secs");
    }

    #[test]
    fn test_percent_out_of_range() {
        let mut config = Config::default();
        config.constraints.battery_low_percent = 150;
        let result = ConfigValidator::validate(&config);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_granularity_over_window_warns() {
        let mut config = Config::default();
        config.scheduler.inexact_window_secs = 30;
        config.scheduler.alarm_granularity_secs = 60;
        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_log_level_warns() {
        let mut config = Config::default();
        config.logging.level = "chatty".to_string();
        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "logging.level");
    }

    #[test]
    fn test_directive_log_level_accepted() {
        let mut config = Config::default();
        config.logging.level = "autocron_core=debug".to_string();
        let result = ConfigValidator::validate(&config);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_into_result_reports_first_error() {
        let mut config = Config::default();
        config.constraints.poll_interval_secs = 0;
        let err = ConfigValidator::validate(&config).into_result().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "constraints.poll_interval_secs"));

        let warnings = ConfigValidator::validate(&Config::default()).into_result().unwrap();
        assert!(warnings.is_empty());
    }
}
