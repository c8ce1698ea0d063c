//! Logging setup.
//!
//! The crate logs through the `log` facade: plan compilation at `info`,
//! cache activity and collection decisions at `debug`, per-member evaluation
//! at `trace`. Applications may install any logger; [`init_logging`] installs
//! `env_logger` configured from a [`LoggingConfig`].

use crate::error::{MapperError, MapperResult};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable holding `env_logger` filter directives.
pub const LOG_FILTER_ENV: &str = "DATAFOLD_MAPPER_LOG";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace or off)
    pub level: String,
    /// Log the rendered plan text whenever a mapper is compiled
    pub log_plans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_plans: false,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> MapperResult<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| MapperError::configuration(format!("Invalid log level '{}'", self.level)))
    }
}

/// Installs `env_logger` at the configured level.
///
/// Directives in `DATAFOLD_MAPPER_LOG` refine the level. Installing twice is
/// not an error; the first logger stays in place.
pub fn init_logging(config: &LoggingConfig) -> MapperResult<()> {
    let level = config.level_filter()?;
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(directives) = std::env::var(LOG_FILTER_ENV) {
        builder.parse_filters(&directives);
    }
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized; keeping the existing one");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        let config = LoggingConfig {
            level: "DEBUG".to_string(),
            ..Default::default()
        };
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);

        let bad = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(bad.level_filter().unwrap_err().is_configuration());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
