//! Icon map: icon name → glyph content code, published as `<font_name>.json`.
//!
//! The generator's structured glyph list is used when it offers one. Otherwise the
//! pairs are recovered from the generated stylesheet, whose rules are expected to
//! look like
//!
//! ```css
//! .icon-home:before {
//!     content: "\f101";
//! }
//! ```
//!
//! That shape is the contract [`RULE_PATTERN`] encodes; a generator that changes it
//! produces an empty or partial map.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contract::GeneratedFont;
use crate::error::PipelineError;

/// Version 1 of the stylesheet rule shape: name after the first `-` of the selector,
/// `:before`, then a double quoted `content` value, whitespace and newlines allowed.
pub const RULE_PATTERN: &str = r#"-([^\s:{},]+):before\s*\{\s*content:\s*"([^"]*)""#;

fn rule_regex() -> &'static Regex {
    static RULE: OnceLock<Regex> = OnceLock::new();
    RULE.get_or_init(|| Regex::new(RULE_PATTERN).expect("RULE_PATTERN is a valid regex"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IconMap(IndexMap<String, String>);

impl IconMap {
    /// Build from pairs in order; a repeated name keeps its first code.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = IndexMap::new();
        for (name, code) in pairs {
            if map.contains_key(&name) {
                debug!(name = %name, "Duplicate icon name, keeping first code");
                continue;
            }
            map.insert(name, code);
        }
        Self(map)
    }

    /// Collect every `(name, code)` rule of a generated stylesheet.
    pub fn from_css(css: &str) -> Self {
        Self::from_pairs(
            rule_regex()
                .captures_iter(css)
                .map(|caps| (caps[1].to_string(), caps[2].to_string())),
        )
    }

    /// Prefer the generator's own glyph list, fall back to parsing its stylesheet.
    pub fn from_font(font: &dyn GeneratedFont) -> Self {
        match font.glyph_codes() {
            Some(pairs) => Self::from_pairs(pairs),
            None => Self::from_css(&font.generate_css()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON with four-space indentation.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        Ok(out)
    }

    /// Write `<scratch>/<font_name>.json`, replacing whatever the generator put there.
    pub async fn write(&self, scratch: &Path, font_name: &str) -> Result<PathBuf, PipelineError> {
        let path = scratch.join(format!("{font_name}.json"));
        info!(path = %path.display(), icons = self.len(), "Generate JSON map");
        let map_write_failed = |source: std::io::Error| PipelineError::MapWriteFailed {
            path: path.clone(),
            source,
        };
        let json = self
            .to_json()
            .map_err(|e| map_write_failed(std::io::Error::from(e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(map_write_failed)?;
        if self.is_empty() {
            warn!(path = %path.display(), "Icon map is empty");
        }
        Ok(path)
    }
}
