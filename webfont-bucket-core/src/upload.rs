//! Batch upload of generated artifacts from scratch storage back next to the sources.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::batch::{BatchOutcome, ItemFailure};
use crate::contract::ObjectStore;
use crate::trigger::CollectionContext;

/// Extensions of files that are published. Everything else in scratch (notably the
/// downloaded sources and the generator's SVG font) stays behind.
pub const ARTIFACT_EXTENSIONS: [&str; 8] =
    ["eot", "woff2", "woff", "ttf", "css", "html", "scss", "json"];

pub fn is_artifact(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext))
}

pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    Some(match ext {
        "eot" => "application/vnd.ms-fontobject",
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        "css" => "text/css",
        "html" => "text/html",
        "scss" => "text/x-scss",
        "json" => "application/json",
        _ => return None,
    })
}

/// Publish every artifact found in `scratch` to `<bucket>/<source_prefix>/<file>`.
///
/// Returns the `s3://` locations that were written. An unreadable scratch directory
/// is reported as a single failure, not as an error.
pub async fn upload_artifacts<S>(
    store: &S,
    context: &CollectionContext,
    scratch: &Path,
) -> BatchOutcome<String>
where
    S: ObjectStore + ?Sized,
{
    info!(scratch = %scratch.display(), "Start uploading font files");
    let files = match artifact_files(scratch).await {
        Ok(files) => files,
        Err(e) => {
            error!(error = ?e, scratch = %scratch.display(), "Reading scratch directory failed");
            return BatchOutcome {
                succeeded: Vec::new(),
                failed: vec![ItemFailure::new(scratch.display().to_string(), e)],
            };
        }
    };

    let uploads = files
        .iter()
        .map(|(file_name, path)| upload_one(store, context, file_name, path));
    let outcome = BatchOutcome::collect(join_all(uploads).await);

    info!(
        uploaded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        bucket = %context.bucket,
        prefix = %context.source_prefix,
        "Font files uploaded"
    );
    outcome
}

/// Scratch files whose extension is on the allow-list, sorted by name.
async fn artifact_files(scratch: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(scratch).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if is_artifact(&file_name) {
            files.push((file_name, entry.path()));
        } else {
            debug!(file = %file_name, "Skip, not a webfont file");
        }
    }
    files.sort();
    Ok(files)
}

async fn upload_one<S>(
    store: &S,
    context: &CollectionContext,
    file_name: &str,
    path: &Path,
) -> Result<String, ItemFailure>
where
    S: ObjectStore + ?Sized,
{
    let body = tokio::fs::read(path).await.map_err(|e| {
        error!(error = ?e, file = file_name, "An error occurred while reading artifact");
        ItemFailure::new(file_name, e)
    })?;

    let key = context.artifact_key(file_name);
    store
        .put_object(&context.bucket, &key, body, content_type_for(file_name))
        .await
        .map_err(|e| {
            error!(error = ?e, bucket = %context.bucket, key = %key, "Upload failed");
            ItemFailure::new(file_name, e)
        })?;

    let uri = context.artifact_uri(file_name);
    info!(uri = %uri, "File uploaded");
    Ok(uri)
}
