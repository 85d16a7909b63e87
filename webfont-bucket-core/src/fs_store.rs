//! Filesystem-backed [`ObjectStore`]: bucket `b` is the directory `<root>/b`, object
//! keys are `/`-separated paths below it. Used for local runs and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{ObjectStore, ObjectSummary, StoreError};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(format!("invalid bucket name {bucket:?}").into());
        }
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(format!("invalid object key {key:?}").into());
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StoreError> {
        let bucket_dir = self.root.join(bucket);
        let mut objects = Vec::new();
        let mut pending = vec![(bucket_dir, String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Box::new(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = format!("{key_prefix}{name}");
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if key.starts_with(prefix) {
                    objects.push(ObjectSummary {
                        key,
                        size: Some(metadata.len()),
                    });
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: Option<&'static str>,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        debug!(bucket, key, path = %path.display(), "Stored object");
        Ok(())
    }
}
