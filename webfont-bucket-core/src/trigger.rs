//! Decodes the inbound S3 notification into a run decision.
//!
//! Decoding is pure: no I/O happens here. The outcome is either a
//! [`CollectionContext`] to process or a [`SkipReason`] explaining why the event is
//! a no-op. Skipping is not an error.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

use aws_lambda_events::event::s3::S3Event;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tracing::{debug, info, warn};

/// The bucket/key pair a run is triggered by. `object_key` is already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRecord {
    pub bucket: String,
    pub object_key: String,
}

impl TriggerRecord {
    /// Build a record from a key as it appears in an S3 notification
    /// (form-encoded: `+` for space, percent escapes for the rest).
    pub fn from_encoded(bucket: impl Into<String>, encoded_key: &str) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: decode_key(encoded_key),
        }
    }

    /// Take the first record of the event. Additional records are ignored.
    pub fn from_event(event: &S3Event) -> Result<Self, SkipReason> {
        let Some(record) = event.records.first() else {
            return Err(SkipReason::NoRecords);
        };
        if event.records.len() > 1 {
            warn!(
                records = event.records.len(),
                "Event carries more than one record; only the first is processed"
            );
        }
        let bucket = record
            .s3
            .bucket
            .name
            .as_deref()
            .ok_or(SkipReason::MissingField("s3.bucket.name"))?;
        let key = record
            .s3
            .object
            .key
            .as_deref()
            .ok_or(SkipReason::MissingField("s3.object.key"))?;
        Ok(Self::from_encoded(bucket, key))
    }
}

/// Undo the S3 event key encoding. Spaces arrive as `+`, non-ASCII as UTF-8 percent escapes.
pub fn decode_key(encoded: &str) -> String {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Where a run reads its sources and publishes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionContext {
    pub bucket: String,
    /// Parent "directory" of the triggering key, without trailing slash.
    pub source_prefix: String,
    /// Last segment of `source_prefix`; also the font name. Never empty.
    pub collection_name: String,
}

impl CollectionContext {
    /// Listing prefix for the collection's siblings. Always ends in `/`, so
    /// `icons/set1` never picks up `icons/set10/...`.
    pub fn listing_prefix(&self) -> String {
        format!("{}/", self.source_prefix)
    }

    /// Object key for an artifact published next to the sources.
    pub fn artifact_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.source_prefix, file_name)
    }

    pub fn artifact_uri(&self, file_name: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.artifact_key(file_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoRecords,
    MissingField(&'static str),
    NoExtension,
    UnsupportedExtension(String),
    NoCollectionName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoRecords => write!(f, "event contains no records"),
            SkipReason::MissingField(field) => write!(f, "event record is missing {field}"),
            SkipReason::NoExtension => write!(f, "unable to infer file type from key"),
            SkipReason::UnsupportedExtension(ext) => write!(f, "skipping non-source file .{ext}"),
            SkipReason::NoCollectionName => {
                write!(f, "source file is not inside a named folder")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Process(CollectionContext),
    Skip(SkipReason),
}

/// Extension of the key's file name, without the dot. Dotfiles such as `.svg` have none.
pub fn file_extension(key: &str) -> Option<&str> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    Path::new(file_name).extension().and_then(OsStr::to_str)
}

/// Classify a record as "process" or "skip".
pub fn decide(record: &TriggerRecord, source_extension: &str) -> Decision {
    let key = record.object_key.as_str();
    let (parent, file_name) = match key.rsplit_once('/') {
        Some((parent, file_name)) => (parent, file_name),
        None => ("", key),
    };

    let Some(extension) = file_extension(file_name) else {
        info!(key, "Unable to infer file type for key");
        return Decision::Skip(SkipReason::NoExtension);
    };
    if extension != source_extension {
        info!(key, extension, "Skipping non-source file");
        return Decision::Skip(SkipReason::UnsupportedExtension(extension.to_string()));
    }

    let source_prefix = parent.trim_end_matches('/');
    let collection_name = source_prefix.rsplit('/').next().unwrap_or_default();
    if collection_name.is_empty() {
        info!(key, "No folder name for source file");
        return Decision::Skip(SkipReason::NoCollectionName);
    }

    let context = CollectionContext {
        bucket: record.bucket.clone(),
        source_prefix: source_prefix.to_string(),
        collection_name: collection_name.to_string(),
    };
    debug!(?context, "Derived collection context");
    Decision::Process(context)
}
