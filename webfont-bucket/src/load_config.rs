/// `load_config` module: loads the static YAML config and applies environment overrides.
///
/// This is the only place where untrusted YAML is parsed and mapped to the strongly
/// typed [`PipelineConfig`] of the core crate plus the CLI-only backend choices.
///
/// # Environment overrides
/// - `WEBFONT_SCRATCH_ROOT` replaces `scratch_root`
/// - `OBJECT_STORE_ENDPOINT` replaces the `s3` store endpoint
///
/// Secrets (the object store token) never live in the YAML file; see [`crate::s3`].
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use webfont_bucket_core::config::PipelineConfig;

pub const SCRATCH_ROOT_ENV: &str = "WEBFONT_SCRATCH_ROOT";
pub const ENDPOINT_ENV: &str = "OBJECT_STORE_ENDPOINT";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub synthesizer: SynthesizerConfig,
}

/// Which object store backend to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Buckets are directories below `root`.
    Filesystem { root: PathBuf },
    /// S3-compatible HTTP endpoint, path-style addressing.
    S3 {
        #[serde(default)]
        endpoint: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SynthesizerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Appended after the generated options, before the SVG files.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
        }
    }
}

fn default_program() -> String {
    "icon-font-generator".to_string()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: CliConfig = serde_yaml::from_str(&config_content)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            e
        })
        .with_context(|| format!("Failed to parse config YAML {path_ref:?}"))?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    apply_env_overrides(&mut config);
    config.pipeline.trace_loaded();
    Ok(config)
}

fn apply_env_overrides(config: &mut CliConfig) {
    if let Ok(root) = std::env::var(SCRATCH_ROOT_ENV) {
        info!(scratch_root = %root, "Scratch root overridden from env");
        config.pipeline.scratch_root = PathBuf::from(root);
    }
    if let StoreConfig::S3 { endpoint } = &mut config.store {
        if let Ok(from_env) = std::env::var(ENDPOINT_ENV) {
            info!(endpoint = %from_env, "Object store endpoint overridden from env");
            *endpoint = Some(from_env);
        }
    }
}
