use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything a [`crate::pipeline::Pipeline`] needs apart from its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parent of the per-run scratch directories.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    /// Extension (without dot) of source icon files.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            source_extension: default_source_extension(),
            style: StyleConfig::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            scratch_root = %self.scratch_root.display(),
            source_extension = %self.source_extension,
            base_selector = %self.style.base_selector,
            "Loaded pipeline config"
        );
        debug!(?self, "Pipeline config loaded (full debug)");
    }
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("webfont-bucket")
}

fn default_source_extension() -> String {
    "svg".to_string()
}

/// Fixed look of every generated font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub base_tag: String,
    pub base_selector: String,
    pub class_prefix: String,
    pub font_types: Vec<String>,
    pub css: bool,
    pub html: bool,
    pub json: bool,
    pub normalize: bool,
    /// Monospace font as wide as the widest icon.
    pub fixed_width: bool,
    pub center_horizontally: bool,
    pub font_height: u32,
    pub descent: u32,
    pub round: f64,
    pub html_template: Option<PathBuf>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            base_tag: "i".to_string(),
            base_selector: ".icon".to_string(),
            class_prefix: "icon-".to_string(),
            font_types: ["eot", "woff2", "woff", "ttf", "svg"]
                .into_iter()
                .map(String::from)
                .collect(),
            css: true,
            html: true,
            json: true,
            normalize: true,
            fixed_width: true,
            center_horizontally: true,
            font_height: 1000,
            descent: 150,
            round: 10e12,
            html_template: None,
        }
    }
}

/// When partial batch failures or empty results abort a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Abort after the download phase when more than this share of sources failed.
    /// `None` never aborts.
    pub max_download_failure_ratio: Option<f64>,
    /// Abort before reclaiming when more than this share of uploads failed.
    pub max_upload_failure_ratio: Option<f64>,
    /// Treat a stylesheet that yields no icon map entries as a failed run.
    pub fail_on_empty_icon_map: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_download_failure_ratio: None,
            max_upload_failure_ratio: None,
            fail_on_empty_icon_map: true,
        }
    }
}
