//! Minimal Cloud Storage JSON API client.
//!
//! Only the calls the driver needs are implemented; every call returns the
//! raw [`StoreError`] and leaves the mapping to domain errors to the driver,
//! which knows which key or bucket a call was about.

use futures::TryStreamExt;
use object_store::gcp::GcpCredentialProvider;
use reqwest::{header, Body, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    adapters::outbound::storage::error::StoreError, ports::storage::ObjectReader,
};

pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// How requests are authorized
#[derive(Clone)]
pub enum Authorization {
    /// No credentials, for emulators and public buckets
    Anonymous,
    /// OAuth bearer tokens from the ambient credential chain
    Bearer(GcpCredentialProvider),
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authorization::Anonymous => write!(f, "Anonymous"),
            Authorization::Bearer(_) => write!(f, "Bearer(..)"),
        }
    }
}

/// Object resource as returned by the JSON API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,
    pub time_created: Option<String>,
    pub updated: Option<String>,
}

/// One page of `objects.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<ObjectResource>,
    pub next_page_token: Option<String>,
}

/// Body of `buckets.insert`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// The API encodes 64-bit integers as strings
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Session handle to the Cloud Storage JSON API
#[derive(Debug, Clone)]
pub struct GcsClient {
    http: reqwest::Client,
    base_url: String,
    auth: Authorization,
}

impl GcsClient {
    pub fn new(base_url: impl Into<String>, auth: Authorization) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }

    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder, StoreError> {
        let builder = self.http.request(method, url);
        match &self.auth {
            Authorization::Anonymous => Ok(builder),
            Authorization::Bearer(provider) => {
                let credential = provider.get_credential().await?;
                Ok(builder.bearer_auth(&credential.bearer))
            }
        }
    }

    /// Send the request and turn any non-success status into
    /// [`StoreError::Http`] carrying the API's error message.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => envelope.error.message,
            Err(_) if text.is_empty() => status.to_string(),
            Err(_) => text,
        };
        debug!(%status, %message, "request failed");
        Err(StoreError::Http { status, message })
    }

    /// `objects.list`
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<ObjectList, StoreError> {
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(bucket)
        );
        let mut query: Vec<(&str, String)> = vec![("prefix", prefix.to_string())];
        if let Some(max) = max_results {
            query.push(("maxResults", max.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let request = self.request(Method::GET, url).await?.query(&query);
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// `objects.get` without the media
    pub async fn get_metadata(&self, bucket: &str, name: &str) -> Result<ObjectResource, StoreError> {
        let request = self
            .request(Method::GET, self.object_url(bucket, name))
            .await?;
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// `objects.get?alt=media`, optionally restricted by a `Range` header
    pub async fn download(
        &self,
        bucket: &str,
        name: &str,
        range: Option<String>,
    ) -> Result<ObjectReader, StoreError> {
        let mut request = self
            .request(Method::GET, self.object_url(bucket, name))
            .await?
            .query(&[("alt", "media")]);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = self.send(request).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(tokio_util::io::StreamReader::new(stream)))
    }

    /// Simple media upload; the body is streamed with chunked encoding
    pub async fn insert(
        &self,
        bucket: &str,
        name: &str,
        data: ObjectReader,
    ) -> Result<ObjectResource, StoreError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(bucket)
        );
        let body = Body::wrap_stream(tokio_util::io::ReaderStream::new(data));
        let request = self
            .request(Method::POST, url)
            .await?
            .query(&[("uploadType", "media"), ("name", name)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// `objects.copy` inside one bucket
    pub async fn copy(
        &self,
        bucket: &str,
        src: &str,
        dst: &str,
    ) -> Result<ObjectResource, StoreError> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(bucket, src),
            urlencoding::encode(bucket),
            urlencoding::encode(dst)
        );
        let request = self
            .request(Method::POST, url)
            .await?
            .json(&serde_json::json!({}));
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// `objects.delete`
    pub async fn delete(&self, bucket: &str, name: &str) -> Result<(), StoreError> {
        let request = self
            .request(Method::DELETE, self.object_url(bucket, name))
            .await?;
        self.send(request).await?;
        Ok(())
    }

    /// `buckets.insert`
    pub async fn insert_bucket(
        &self,
        project: &str,
        bucket: &BucketResource,
    ) -> Result<(), StoreError> {
        let url = format!("{}/storage/v1/b", self.base_url);
        let request = self
            .request(Method::POST, url)
            .await?
            .query(&[("project", project)])
            .json(bucket);
        self.send(request).await?;
        Ok(())
    }
}
