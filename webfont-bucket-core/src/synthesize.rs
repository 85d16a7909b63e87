//! Font synthesis adapter.
//!
//! [`FontConfig`] is the fixed style configuration handed to the external generator.
//! [`CommandSynthesizer`] drives an `icon-font-generator` compatible command line
//! tool: it writes the fonts, stylesheet, HTML preview and JSON placeholder into
//! [`FontConfig::dest`], after which the stylesheet is read back for icon map
//! extraction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::StyleConfig;
use crate::contract::{FontSynthesizer, GeneratedFont, SynthesisError};
use crate::trigger::CollectionContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOptions {
    /// Public base URL of the published artifacts, used inside the HTML preview.
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontConfig {
    pub dest: PathBuf,
    pub source: PathBuf,
    pub files: Vec<PathBuf>,
    pub font_name: String,
    pub font_types: Vec<String>,
    pub css: bool,
    pub html: bool,
    pub json: bool,
    pub normalize: bool,
    pub fixed_width: bool,
    pub center_horizontally: bool,
    pub font_height: u32,
    pub descent: u32,
    pub round: f64,
    pub base_tag: String,
    pub base_selector: String,
    pub class_prefix: String,
    pub html_template: Option<PathBuf>,
    pub template_options: TemplateOptions,
}

impl FontConfig {
    /// Configuration for one collection: output and input both live in the run's scratch directory.
    pub fn for_collection(
        style: &StyleConfig,
        context: &CollectionContext,
        scratch: &Path,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            dest: scratch.to_path_buf(),
            source: scratch.to_path_buf(),
            files,
            font_name: context.collection_name.clone(),
            font_types: style.font_types.clone(),
            css: style.css,
            html: style.html,
            json: style.json,
            normalize: style.normalize,
            fixed_width: style.fixed_width,
            center_horizontally: style.center_horizontally,
            font_height: style.font_height,
            descent: style.descent,
            round: style.round,
            base_tag: style.base_tag.clone(),
            base_selector: style.base_selector.clone(),
            class_prefix: style.class_prefix.clone(),
            html_template: style.html_template.clone(),
            template_options: TemplateOptions {
                bucket: format!(
                    "https://{}.s3.amazonaws.com/{}/",
                    context.bucket, context.source_prefix
                ),
            },
        }
    }

    pub fn stylesheet_path(&self) -> PathBuf {
        self.dest.join(format!("{}.css", self.font_name))
    }
}

/// Generated font whose only window into the glyphs is the stylesheet text.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    css: String,
}

impl Stylesheet {
    pub fn new(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }
}

impl GeneratedFont for Stylesheet {
    fn generate_css(&self) -> String {
        self.css.clone()
    }

    fn glyph_codes(&self) -> Option<Vec<(String, String)>> {
        None
    }
}

/// Runs an external generator program once per collection.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    extra_args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    /// Command line for `config`: options first, then the SVG files.
    pub fn args(&self, config: &FontConfig) -> Vec<OsString> {
        let flag = |on: bool| if on { "true" } else { "false" };
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |name: &str, value: &dyn AsRef<std::ffi::OsStr>| {
            args.push(name.into());
            args.push(value.as_ref().to_os_string());
        };

        push("--out", &config.dest);
        push("--name", &config.font_name);
        push("--types", &config.font_types.join(","));
        push("--css", &flag(config.css));
        push("--html", &flag(config.html));
        push("--json", &flag(config.json));
        push("--normalize", &flag(config.normalize));
        push("--mono", &flag(config.fixed_width));
        push("--center", &flag(config.center_horizontally));
        push("--height", &config.font_height.to_string());
        push("--descent", &config.descent.to_string());
        push("--round", &config.round.to_string());
        push("--tag", &config.base_tag);
        push("--selector", &config.base_selector);
        push("--prefix", &config.class_prefix.trim_end_matches('-'));
        push("--cssfontsurl", &config.template_options.bucket);
        if let Some(template) = &config.html_template {
            push("--htmltp", template);
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args.extend(config.files.iter().map(|f| f.as_os_str().to_os_string()));
        args
    }
}

#[async_trait]
impl FontSynthesizer for CommandSynthesizer {
    async fn generate(
        &self,
        config: &FontConfig,
    ) -> Result<Box<dyn GeneratedFont>, SynthesisError> {
        let args = self.args(config);
        info!(
            program = %self.program,
            font_name = %config.font_name,
            files = config.files.len(),
            dest = %config.dest.display(),
            "Start generating webfont"
        );
        debug!(?args, "Font generator arguments");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                error!(error = ?source, program = %self.program, "Failed to launch font generator");
                SynthesisError::Launch {
                    program: self.program.clone(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = %output.status, stderr = %stderr, "Font generator exited with error");
            return Err(SynthesisError::Exit {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stylesheet = config.stylesheet_path();
        let css = tokio::fs::read_to_string(&stylesheet).await.map_err(|e| {
            error!(error = ?e, path = %stylesheet.display(), "Generated stylesheet missing");
            SynthesisError::MissingStylesheet(stylesheet.clone())
        })?;

        info!(font_name = %config.font_name, "Successfully generated webfont files");
        Ok(Box::new(Stylesheet::new(css)))
    }
}
