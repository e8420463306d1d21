//! Environment variable validation and configuration module for logvault
//!
//! This module provides centralized validation and configuration management
//! for all environment variables used by the service.
//!
//! # Supported Environment Variables
//!
//! ## Database Configuration
//! - `LOGVAULT_DB_URL`: Database connection URL (default: "sqlite://logvault.db")
//!
//! ## Logging Configuration
//! - `RUST_LOG`: Standard Rust logging configuration
//! - `LOGVAULT_LOG_LEVEL`: Application-specific log filter override
//!
//! ## Pipeline Configuration
//! - `LOGVAULT_BATCH_SIZE`: Buffer size that triggers an inline flush (default: "50")
//! - `LOGVAULT_FLUSH_INTERVAL_SECS`: Background flush interval in seconds (default: "2.0")
//! - `LOGVAULT_MAX_RETRIES`: Persistence attempts per batch (default: "3")
//! - `LOGVAULT_RETRY_BASE_DELAY_SECS`: Backoff base delay in seconds (default: "0.5")
//! - `LOGVAULT_RETRY_MAX_DELAY_SECS`: Backoff delay ceiling in seconds (default: "5.0")

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::service::LogServiceConfig;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Environment validation errors
#[derive(Debug, Clone)]
pub struct EnvValidationError {
    pub variable: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

/// Severity level for environment validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSeverity {
    /// Critical errors that prevent application startup
    Critical,
    /// Warnings about suboptimal configurations
    Warning,
    /// Informational messages about default values being used
    Info,
}

/// Validated application configuration derived from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Logging
    pub log_filter: String,

    // Pipeline
    pub batch_size: usize,
    pub flush_interval_secs: f64,
    pub max_retries: u32,
    pub retry_base_delay_secs: f64,
    pub retry_max_delay_secs: f64,
}

impl AppConfig {
    /// Pipeline tuning in the form the log service consumes.
    pub fn log_service_config(&self) -> LogServiceConfig {
        LogServiceConfig {
            batch_size: self.batch_size,
            flush_interval: Duration::from_secs_f64(self.flush_interval_secs),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_secs_f64(self.retry_base_delay_secs),
            retry_max_delay: Duration::from_secs_f64(self.retry_max_delay_secs),
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Validate all environment variables and return configuration or errors
pub fn validate_environment() -> Result<AppConfig, Vec<EnvValidationError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Database configuration
    let database_url = env::var("LOGVAULT_DB_URL").unwrap_or_else(|_| {
        warnings.push(EnvValidationError {
            variable: "LOGVAULT_DB_URL".to_string(),
            message: format!(
                "Using default database URL '{}'",
                crate::database::DEFAULT_DB_URL
            ),
            severity: ErrorSeverity::Info,
        });
        crate::database::DEFAULT_DB_URL.to_string()
    });

    // Logging configuration
    let log_filter = env::var("LOGVAULT_LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| {
            warnings.push(EnvValidationError {
                variable: "RUST_LOG/LOGVAULT_LOG_LEVEL".to_string(),
                message: "Using default log filter 'logvault=info'".to_string(),
                severity: ErrorSeverity::Info,
            });
            "logvault=info".to_string()
        });

    // Pipeline configuration
    let batch_size = parse_env_var_with_default("LOGVAULT_BATCH_SIZE", 50usize, &mut warnings);
    if batch_size == 0 {
        errors.push(EnvValidationError {
            variable: "LOGVAULT_BATCH_SIZE".to_string(),
            message: "Batch size must be at least 1".to_string(),
            severity: ErrorSeverity::Critical,
        });
    }

    let flush_interval_secs =
        parse_env_var_with_default("LOGVAULT_FLUSH_INTERVAL_SECS", 2.0f64, &mut warnings);
    if !flush_interval_secs.is_finite() || flush_interval_secs <= 0.0 {
        errors.push(EnvValidationError {
            variable: "LOGVAULT_FLUSH_INTERVAL_SECS".to_string(),
            message: format!("Flush interval must be positive, got {}", flush_interval_secs),
            severity: ErrorSeverity::Critical,
        });
    }

    let max_retries = parse_env_var_with_default("LOGVAULT_MAX_RETRIES", 3u32, &mut warnings);

    let retry_base_delay_secs =
        parse_env_var_with_default("LOGVAULT_RETRY_BASE_DELAY_SECS", 0.5f64, &mut warnings);
    let retry_max_delay_secs =
        parse_env_var_with_default("LOGVAULT_RETRY_MAX_DELAY_SECS", 5.0f64, &mut warnings);
    if !retry_base_delay_secs.is_finite()
        || !retry_max_delay_secs.is_finite()
        || retry_base_delay_secs < 0.0
        || retry_max_delay_secs < 0.0
    {
        errors.push(EnvValidationError {
            variable: "LOGVAULT_RETRY_BASE_DELAY_SECS/LOGVAULT_RETRY_MAX_DELAY_SECS".to_string(),
            message: "Retry delays must be non-negative numbers".to_string(),
            severity: ErrorSeverity::Critical,
        });
    } else if retry_max_delay_secs < retry_base_delay_secs {
        warnings.push(EnvValidationError {
            variable: "LOGVAULT_RETRY_MAX_DELAY_SECS".to_string(),
            message: "Max delay is below the base delay, backoff will be capped immediately"
                .to_string(),
            severity: ErrorSeverity::Warning,
        });
    }

    // Add all warnings to errors for reporting
    errors.extend(warnings);

    let has_critical_errors = errors.iter().any(|e| e.severity == ErrorSeverity::Critical);
    if has_critical_errors {
        return Err(errors);
    }

    // Log non-critical issues
    for error in &errors {
        match error.severity {
            ErrorSeverity::Warning => warn!("{}: {}", error.variable, error.message),
            ErrorSeverity::Info => info!("{}: {}", error.variable, error.message),
            ErrorSeverity::Critical => {}
        }
    }

    Ok(AppConfig {
        database_url,
        log_filter,
        batch_size,
        flush_interval_secs,
        max_retries,
        retry_base_delay_secs,
        retry_max_delay_secs,
    })
}

/// Get the validated configuration, exiting the process if validation fails
pub fn get_config() -> AppConfig {
    match validate_environment() {
        Ok(config) => config,
        Err(errors) => {
            eprintln!("Environment validation failed:");
            for error in errors {
                match error.severity {
                    ErrorSeverity::Critical => {
                        eprintln!("CRITICAL - {}: {}", error.variable, error.message)
                    }
                    ErrorSeverity::Warning => {
                        eprintln!("WARNING - {}: {}", error.variable, error.message)
                    }
                    ErrorSeverity::Info => {
                        eprintln!("INFO - {}: {}", error.variable, error.message)
                    }
                }
            }
            std::process::exit(1);
        }
    }
}

/// Helper function to parse environment variable with default value
fn parse_env_var_with_default<T>(
    var_name: &str,
    default: T,
    warnings: &mut Vec<EnvValidationError>,
) -> T
where
    T: FromStr + Clone + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(var_name) {
        Ok(value_str) => match value_str.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warnings.push(EnvValidationError {
                    variable: var_name.to_string(),
                    message: format!(
                        "Invalid value '{}': {}. Using default: {}",
                        value_str, e, default
                    ),
                    severity: ErrorSeverity::Warning,
                });
                default
            }
        },
        Err(_) => {
            warnings.push(EnvValidationError {
                variable: var_name.to_string(),
                message: format!("Using default value: {}", default),
                severity: ErrorSeverity::Info,
            });
            default
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Environment mutation is process-global, so the phases run inside one
    // test to keep them from racing each other.
    #[test]
    fn test_environment_validation() {
        // Defaults with nothing set
        unsafe {
            env::remove_var("LOGVAULT_DB_URL");
            env::remove_var("LOGVAULT_BATCH_SIZE");
            env::remove_var("LOGVAULT_FLUSH_INTERVAL_SECS");
            env::remove_var("LOGVAULT_MAX_RETRIES");
            env::remove_var("LOGVAULT_RETRY_BASE_DELAY_SECS");
            env::remove_var("LOGVAULT_RETRY_MAX_DELAY_SECS");
        }
        let config = validate_environment().expect("defaults should validate");
        assert_eq!(config.database_url, "sqlite://logvault.db");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_interval_secs, 2.0);
        assert_eq!(config.max_retries, 3);

        // Unparseable numeric falls back to the default with a warning
        unsafe {
            env::set_var("LOGVAULT_MAX_RETRIES", "lots");
        }
        let config = validate_environment().expect("fallback should validate");
        assert_eq!(config.max_retries, 3);
        unsafe {
            env::remove_var("LOGVAULT_MAX_RETRIES");
        }

        // Zero batch size is critical
        unsafe {
            env::set_var("LOGVAULT_BATCH_SIZE", "0");
        }
        let errors = validate_environment().expect_err("zero batch size must fail");
        assert!(errors.iter().any(|e| e.variable == "LOGVAULT_BATCH_SIZE"
            && e.severity == ErrorSeverity::Critical));
        unsafe {
            env::remove_var("LOGVAULT_BATCH_SIZE");
        }

        // Negative flush interval is critical
        unsafe {
            env::set_var("LOGVAULT_FLUSH_INTERVAL_SECS", "-1");
        }
        let errors = validate_environment().expect_err("negative interval must fail");
        assert!(errors
            .iter()
            .any(|e| e.variable == "LOGVAULT_FLUSH_INTERVAL_SECS"
                && e.severity == ErrorSeverity::Critical));
        unsafe {
            env::remove_var("LOGVAULT_FLUSH_INTERVAL_SECS");
        }
    }

    #[test]
    fn test_log_service_config_conversion() {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            log_filter: "logvault=info".to_string(),
            batch_size: 10,
            flush_interval_secs: 0.25,
            max_retries: 2,
            retry_base_delay_secs: 0.1,
            retry_max_delay_secs: 1.0,
        };
        let service_config = config.log_service_config();
        assert_eq!(service_config.batch_size, 10);
        assert_eq!(service_config.flush_interval, Duration::from_millis(250));
        assert_eq!(service_config.retry_max_delay, Duration::from_secs(1));
    }
}
