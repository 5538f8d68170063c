//! Engine configuration.

use crate::errors::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// **ENGINE CONFIGURATION**
///
/// **PURPOSE**: Tunables shared by the scope tree, context builder and name manager.
/// **USAGE**: Construct with `Default`, or load from JSON via [`EngineConfig::from_json_str`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum wait for a per-node definition lock on the missing-dependency path.
    pub lock_timeout_ms: u64,

    /// Allow `get` to learn undeclared dependencies at request time.
    pub self_healing: bool,

    /// Fail resolution when a claimed dependency has no supplier.
    pub strict_resolution: bool,

    /// Prefix for names generated by the name manager. Must be a valid name start.
    pub generated_name_prefix: String,

    /// Deepest allowed scope provider tree (root is depth 0).
    pub max_tree_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            self_healing: true,
            strict_resolution: false,
            generated_name_prefix: "_".to_string(),
            max_tree_depth: 64,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ScopeError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(ScopeError::InvalidConfiguration {
                message: "lock_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.max_tree_depth == 0 {
            return Err(ScopeError::InvalidConfiguration {
                message: "max_tree_depth must be greater than zero".to_string(),
            });
        }
        let starts_ok = self
            .generated_name_prefix
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        let rest_ok = self
            .generated_name_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !starts_ok || !rest_ok {
            return Err(ScopeError::InvalidConfiguration {
                message: format!(
                    "generated_name_prefix '{}' is not a valid name start",
                    self.generated_name_prefix
                ),
            });
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
