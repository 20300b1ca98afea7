use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strm_state::DeploymentFlags;

use crate::LoadedConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Typed view of the merged configuration. Unknown keys are tolerated here
/// and surfaced by [`crate::report_unused_keys`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub deployment: DeploymentFlags,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReconcilerConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the reconciler schema")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_layered_yaml_from_strings;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let loaded = load_layered_yaml_from_strings(&["{}"]).unwrap();
        let cfg = ReconcilerConfig::from_loaded(&loaded).unwrap();
        assert_eq!(cfg, ReconcilerConfig::default());
        assert!(!cfg.deployment.restricted_lifecycle_types);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let loaded =
            load_layered_yaml_from_strings(&["deployment:\n  restricted_lifecycle_types: maybe\n"])
                .unwrap();
        let err = ReconcilerConfig::from_loaded(&loaded).unwrap_err();
        assert!(format!("{err:#}").contains("reconciler schema"));
    }
}
