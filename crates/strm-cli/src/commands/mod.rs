//! Command handler modules for the `strm` CLI.
//!
//! Shared utilities live here; command-specific logic lives in submodules.

pub mod plan;

use std::path::PathBuf;

use anyhow::Result;
use clap::ValueEnum;
use strm_config::{LoadedConfig, ReconcilerConfig, UnusedKeyPolicy};
use tracing::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnusedKeys {
    Warn,
    Fail,
}

impl From<UnusedKeys> for UnusedKeyPolicy {
    fn from(v: UnusedKeys) -> Self {
        match v {
            UnusedKeys::Warn => UnusedKeyPolicy::Warn,
            UnusedKeys::Fail => UnusedKeyPolicy::Fail,
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
///
/// Filter precedence: `RUST_LOG`, then the config's `logging.filter`, then
/// `info`.
pub fn init_tracing(config_filter: Option<&str>) {
    let fallback = config_filter.unwrap_or("info").to_string();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .init();
}

/// Load layered config (if any) into its typed view.
pub fn load_config(paths: &[PathBuf]) -> Result<(Option<LoadedConfig>, ReconcilerConfig)> {
    if paths.is_empty() {
        return Ok((None, ReconcilerConfig::default()));
    }
    let loaded = strm_config::load_layered_yaml(paths)?;
    let typed = ReconcilerConfig::from_loaded(&loaded)?;
    Ok((Some(loaded), typed))
}

/// Runs after tracing is up so warnings are visible.
pub fn check_unused_keys(loaded: &LoadedConfig, policy: UnusedKeys) -> Result<()> {
    let report = strm_config::report_unused_keys(&loaded.config_json, policy.into())?;
    for pointer in &report.unused_leaf_pointers {
        warn!(%pointer, "config key is not read by the reconciler");
    }
    Ok(())
}
