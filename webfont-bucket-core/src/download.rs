//! Batch download of a collection's source files into scratch storage.
//!
//! Lists the collection prefix, keeps only source files, then fetches and writes
//! every one of them concurrently. A failing object is logged and dropped; it never
//! aborts the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchOutcome, ItemFailure};
use crate::contract::ObjectStore;
use crate::trigger::{file_extension, CollectionContext};

/// Last path segment of an object key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// True when the key's file name ends in `.<extension>`.
pub fn has_extension(key: &str, extension: &str) -> bool {
    file_extension(key) == Some(extension)
}

/// Materialize every source file of the collection under `scratch`.
///
/// Returns the scratch paths of the files that were fetched and written, plus one
/// [`ItemFailure`] per object that was dropped. A failed listing yields an empty
/// batch with a single failure for the prefix.
pub async fn download_sources<S>(
    store: &S,
    context: &CollectionContext,
    source_extension: &str,
    scratch: &Path,
) -> BatchOutcome<PathBuf>
where
    S: ObjectStore + ?Sized,
{
    let prefix = context.listing_prefix();
    let objects = match store.list_objects(&context.bucket, &prefix).await {
        Ok(objects) => objects,
        Err(e) => {
            error!(
                error = ?e,
                bucket = %context.bucket,
                prefix = %prefix,
                "Listing collection failed"
            );
            return BatchOutcome {
                succeeded: Vec::new(),
                failed: vec![ItemFailure::new(prefix, e)],
            };
        }
    };

    // Scratch is flat: a nested key sharing a file name with an earlier one is dropped.
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut sources = Vec::new();
    for object in objects {
        if !has_extension(&object.key, source_extension) {
            debug!(key = %object.key, "Not a source file, skipping");
        } else if !seen.insert(basename(&object.key).to_string()) {
            warn!(key = %object.key, "Duplicate file name in collection, skipping");
            duplicates.push(ItemFailure::new(object.key, "duplicate basename"));
        } else {
            sources.push(object);
        }
    }

    let fetches = sources
        .iter()
        .map(|object| fetch_one(store, &context.bucket, &object.key, scratch));
    let mut outcome = BatchOutcome::collect(join_all(fetches).await);
    outcome.failed.extend(duplicates);

    info!(
        downloaded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        bucket = %context.bucket,
        prefix = %prefix,
        scratch = %scratch.display(),
        "Source files downloaded"
    );
    outcome
}

async fn fetch_one<S>(
    store: &S,
    bucket: &str,
    key: &str,
    scratch: &Path,
) -> Result<PathBuf, ItemFailure>
where
    S: ObjectStore + ?Sized,
{
    debug!(key, "Downloading");
    let body = store.get_object(bucket, key).await.map_err(|e| {
        error!(error = ?e, key, "Download failed");
        ItemFailure::new(key, e)
    })?;

    let target = scratch.join(basename(key));
    tokio::fs::write(&target, body).await.map_err(|e| {
        error!(error = ?e, key, path = %target.display(), "Writing source file failed");
        ItemFailure::new(key, e)
    })?;
    Ok(target)
}
