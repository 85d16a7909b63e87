#![doc = "HTTP object store: talks to an S3-compatible endpoint with path-style requests."]
//
//! # S3-compatible object store
//!
//! Implements the core [`ObjectStore`] contract over plain S3 REST calls:
//!
//! - `GET /<bucket>?list-type=2&prefix=...` (ListObjectsV2, paginated)
//! - `GET /<bucket>/<key>` (GetObject)
//! - `PUT /<bucket>/<key>` (PutObject)
//!
//! Requests are not SigV4-signed. Point `OBJECT_STORE_ENDPOINT` at an endpoint that
//! accepts the bearer token in `OBJECT_STORE_TOKEN` (or anonymous access), such as a
//! signing gateway or a local MinIO with a public policy.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::env;
use tracing::{debug, error, info};
use webfont_bucket_core::contract::{ObjectStore, ObjectSummary, StoreError};

pub const TOKEN_ENV: &str = "OBJECT_STORE_TOKEN";

pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            error!(error = ?e, endpoint, "Invalid object store endpoint");
            e
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(format!("object store endpoint {endpoint} cannot be a base URL").into());
        }
        info!(endpoint = %endpoint, token_set = token.is_some(), "Initialized HttpObjectStore");
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            token,
        })
    }

    /// Build from an endpoint (config or env) plus `OBJECT_STORE_TOKEN`.
    pub fn new_from_env(endpoint: Option<&str>) -> Result<Self, StoreError> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => env::var(crate::load_config::ENDPOINT_ENV).map_err(|e| {
                error!(error = ?e, "OBJECT_STORE_ENDPOINT missing in config and environment");
                e
            })?,
        };
        Self::new(&endpoint, env::var(TOKEN_ENV).ok())
    }

    pub fn bucket_url(&self, bucket: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket);
        }
        url
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket).extend(key.split('/'));
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
    Err(format!("{url} returned {status}: {}", error_code(status, &body)).into())
}

/// S3 error code from an error body, e.g. `NoSuchKey`; falls back to the raw body.
fn error_code(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct S3Error {
        code: String,
        #[serde(default)]
        message: String,
    }
    match quick_xml::de::from_str::<S3Error>(body) {
        Ok(err) => format!("{} {}", err.code, err.message).trim().to_string(),
        Err(_) if body.is_empty() => status.canonical_reason().unwrap_or("").to_string(),
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default)]
    pub contents: Vec<ListedObject>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ListedObject {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

pub fn parse_listing(xml: &str) -> Result<ListBucketResult, StoreError> {
    Ok(quick_xml::de::from_str(xml)?)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StoreError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut url = self.bucket_url(bucket);
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2").append_pair("prefix", prefix);
                if let Some(token) = &continuation {
                    query.append_pair("continuation-token", token);
                }
            }
            debug!(url = %url, "Listing objects");
            let request = self.request(reqwest::Method::GET, url);
            let response = check_status(request.send().await?).await?;
            let page = parse_listing(&response.text().await?)?;

            objects.extend(page.contents.into_iter().map(|o| ObjectSummary {
                key: o.key,
                size: o.size,
            }));
            match (page.is_truncated, page.next_continuation_token) {
                (true, Some(token)) => continuation = Some(token),
                _ => break,
            }
        }
        info!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.object_url(bucket, key);
        let request = self.request(reqwest::Method::GET, url);
        let response = check_status(request.send().await?).await?;
        let body = response.bytes().await?;
        debug!(bucket, key, bytes = body.len(), "Fetched object");
        Ok(body.to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&'static str>,
    ) -> Result<(), StoreError> {
        let url = self.object_url(bucket, key);
        let content_hash = format!("{:x}", Sha256::digest(&body));
        let mut request = self
            .request(reqwest::Method::PUT, url)
            .header("x-amz-content-sha256", &content_hash);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        check_status(request.body(body).send().await?).await?;
        debug!(bucket, key, sha256 = %content_hash, "Stored object");
        Ok(())
    }
}
