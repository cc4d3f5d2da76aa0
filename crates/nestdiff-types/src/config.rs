use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Options consumed by the comparison engine.
///
/// Passed in when a comparison starts and immutable for the run's duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    /// Report members present on only one side as additions/removals.
    pub include_added_removed: bool,
    /// Minimum similarity in `[0, 1]` for two differently named members to be
    /// paired. `0.0` disables fuzzy matching.
    pub fuzzy_threshold: f64,
    /// Upper bound on the bytes of diff text emitted before the run is cut
    /// short.
    pub max_report_size: Option<u64>,
    /// Maximum recursion depth, also bounding nested-container unwrapping.
    pub max_depth: usize,
    /// Members larger than this are never scored for fuzzy matching.
    pub fuzzy_max_bytes: u64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            include_added_removed: false,
            fuzzy_threshold: 0.75,
            max_report_size: None,
            max_depth: 64,
            fuzzy_max_bytes: 4 * 1024 * 1024,
        }
    }
}

impl CompareConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every option is within its valid range.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "fuzzy_threshold",
                reason: format!("{} is outside [0, 1]", self.fuzzy_threshold),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_depth",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns `true` if fuzzy matching should run at all.
    pub fn fuzzy_enabled(&self) -> bool {
        self.fuzzy_threshold > 0.0
    }
}
