//! Mapper configuration.
//!
//! Settings load from TOML or JSON files (chosen by extension) and may be
//! overridden by `DATAFOLD_MAPPER_*` environment variables.

use crate::error::{MapperError, MapperResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;


/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DATAFOLD_MAPPER";

/// Placeholder replaced by the type name in identifier name patterns.
pub const TYPE_PLACEHOLDER: &str = "{type}";

/// Top-level mapper configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Member matching settings
    pub matching: MatchingConfig,
    /// Identity tracking settings
    pub tracking: TrackingConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Member matching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fall back to case-insensitive member name matches
    pub case_insensitive: bool,
    /// How many source members deep flattened names are searched
    pub max_flattening_depth: usize,
    /// Member names tried, in order, when inferring an element's identifier
    pub identifier_names: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            max_flattening_depth: 3,
            identifier_names: vec![
                "Id".to_string(),
                format!("{}Id", TYPE_PLACEHOLDER),
                "Identifier".to_string(),
            ],
        }
    }
}

impl MatchingConfig {
    /// Identifier candidates for a type, e.g. `Id`, `CustomerId`, `Identifier`.
    pub fn identifier_candidates(&self, type_name: &str) -> Vec<String> {
        self.identifier_names
            .iter()
            .map(|pattern| pattern.replace(TYPE_PLACEHOLDER, type_name))
            .collect()
    }
}

/// Identity tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Preserve shared references and cycles by default
    pub object_tracking: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { object_tracking: true }
    }
}

impl MapperConfig {
    /// Loads configuration from a `.toml` or `.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> MapperResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MapperError::ConfigLoad {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: MapperConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| MapperError::ConfigLoad {
                message: format!("Failed to parse TOML config: {}", e),
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| MapperError::ConfigLoad {
                message: format!("Failed to parse JSON config: {}", e),
            })?,
            _ => {
                return Err(MapperError::ConfigLoad {
                    message: "Unsupported config file format (only JSON and TOML supported)".to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> MapperResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `DATAFOLD_MAPPER_*` variables; unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_CASE_INSENSITIVE", ENV_PREFIX)) {
            if let Ok(enabled) = val.parse::<bool>() {
                self.matching.case_insensitive = enabled;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_MAX_FLATTENING_DEPTH", ENV_PREFIX)) {
            if let Ok(depth) = val.parse::<usize>() {
                self.matching.max_flattening_depth = depth;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_IDENTIFIER_NAMES", ENV_PREFIX)) {
            let names: Vec<String> = val
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if !names.is_empty() {
                self.matching.identifier_names = names;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_OBJECT_TRACKING", ENV_PREFIX)) {
            if let Ok(enabled) = val.parse::<bool>() {
                self.tracking.object_tracking = enabled;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            self.logging.level = val;
        }
    }

    /// Validates configuration.
    pub fn validate(&self) -> MapperResult<()> {
        if self.matching.max_flattening_depth == 0 || self.matching.max_flattening_depth > 8 {
            return Err(MapperError::configuration(
                "Max flattening depth must be between 1 and 8",
            ));
        }

        if self.matching.identifier_names.is_empty() {
            return Err(MapperError::configuration(
                "At least one identifier name must be configured",
            ));
        }

        if let Some(bad) = self
            .matching
            .identifier_names
            .iter()
            .find(|name| name.replace(TYPE_PLACEHOLDER, "").chars().any(|c| !(c.is_alphanumeric() || c == '_')))
        {
            return Err(MapperError::configuration(format!(
                "Invalid identifier name pattern '{}'",
                bad
            )));
        }

        self.logging.level_filter()?;
        Ok(())
    }
}
