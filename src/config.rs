//! Planner configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Options controlling plan synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Merge consecutive reshapes and drop reshapes that do not change the
    /// axis structure
    pub simplify: bool,
    /// Re-derive the output shape from the emitted ops and compare it with
    /// the right-hand side
    pub verify: bool,
}

impl PlannerConfig {
    pub fn new(simplify: bool, verify: bool) -> Self {
        Self { simplify, verify }
    }

    /// Emit every synthesis step, without simplification
    pub fn unsimplified() -> Self {
        Self {
            simplify: false,
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Failure to load a [`PlannerConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert!(config.simplify);
        assert!(config.verify);
        assert!(!PlannerConfig::unsimplified().simplify);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PlannerConfig = serde_json::from_str(r#"{"simplify": false}"#).unwrap();
        assert_eq!(config, PlannerConfig::new(false, true));

        let empty: PlannerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, PlannerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("shapec-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"verify": false}"#).unwrap();
        let config = PlannerConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config, PlannerConfig::new(true, false));

        assert!(matches!(
            PlannerConfig::from_json_file(std::env::temp_dir().join("shapec-missing-config.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
