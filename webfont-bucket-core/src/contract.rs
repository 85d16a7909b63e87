//! # contract: boundaries of the pipeline
//!
//! The pipeline talks to exactly two collaborators it does not implement:
//!
//! - an object store with prefix listing, get and put ([`ObjectStore`])
//! - a font generator that turns SVG files into font artifacts ([`FontSynthesizer`])
//!
//! ## Mocking & Testing
//! - All traits are annotated for `mockall`; enable the `test-export-mocks` feature
//!   (on by default) to use `MockObjectStore`, `MockFontSynthesizer` and
//!   `MockGeneratedFont` from integration tests of dependent crates.
//!
//! ## Adding New Backends
//! - Implement [`ObjectStore`] for the storage service.
//! - Convert every upstream failure into a boxed [`StoreError`]; the batch steps
//!   turn those into per-item failures, never into a panic.

use async_trait::async_trait;

use mockall::automock;

use crate::synthesize::FontConfig;

/// Error type returned by object store operations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// One entry of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key inside the bucket.
    pub key: String,
    /// Size in bytes, when the store reports it.
    pub size: Option<u64>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
        }
    }
}

/// Key-value blob store with prefix listing.
///
/// The trait is `Send` + `Sync` and intended for async/await usage. Batch steps call
/// `get_object`/`put_object` concurrently on a shared reference.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in `bucket` whose key starts with `prefix`.
    async fn list_objects(&self, bucket: &str, prefix: &str)
        -> Result<Vec<ObjectSummary>, StoreError>;

    /// Fetch the full body of a single object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `body` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&'static str>,
    ) -> Result<(), StoreError>;
}

/// Failure of the external font generator.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("failed to launch font generator `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("font generator exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("font generator produced no stylesheet at {0}")]
    MissingStylesheet(std::path::PathBuf),
    #[error("{0}")]
    Other(String),
}

/// Handle on a generated font, used to recover the icon name → glyph code pairs.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait GeneratedFont: Send + Sync {
    /// Render the generated stylesheet text.
    fn generate_css(&self) -> String;

    /// Name → code pairs straight from the generator's model, in glyph order.
    /// Generators that only expose text return `None`.
    fn glyph_codes(&self) -> Option<Vec<(String, String)>>;
}

/// The external font generator.
///
/// Called once per run; it writes its artifacts into [`FontConfig::dest`] before
/// the returned future resolves.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FontSynthesizer: Send + Sync {
    async fn generate(&self, config: &FontConfig)
        -> Result<Box<dyn GeneratedFont>, SynthesisError>;
}
