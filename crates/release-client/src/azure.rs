//! Azure Blob Storage backend.
//!
//! Speaks the two REST operations the query pipeline needs:
//! - Find Blobs by Tags: `GET {account}?comp=blobs&where=...`
//! - Get Blob: `GET {account}/{container}/{path}`
//!
//! Credentials are read from the environment:
//! - `AZURE_STORAGE_TOKEN`: OAuth bearer token
//! - `AZURE_STORAGE_SAS_TOKEN`: account SAS query string
//!
//! With neither set, requests are anonymous.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{BlobStore, FilterBlobsPage, StorageResult, TaggedBlob};

pub const TOKEN_ENV: &str = "AZURE_STORAGE_TOKEN";
pub const SAS_TOKEN_ENV: &str = "AZURE_STORAGE_SAS_TOKEN";

/// Service version sent with every request. Blob tags need 2019-12-12 or later.
pub const DEFAULT_API_VERSION: &str = "2021-08-06";

const USER_AGENT: &str = concat!("release-client/", env!("CARGO_PKG_VERSION"));

/// How requests are authorised.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AzureCredential {
    #[default]
    Anonymous,
    Bearer(String),
    /// SAS query string, with or without the leading `?`
    Sas(String),
}

impl AzureCredential {
    /// Pick a credential from optional token values; bearer wins.
    pub fn from_values(token: Option<String>, sas: Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (non_empty(token), non_empty(sas)) {
            (Some(token), _) => AzureCredential::Bearer(token),
            (None, Some(sas)) => AzureCredential::Sas(sas.trim_start_matches('?').to_string()),
            (None, None) => AzureCredential::Anonymous,
        }
    }

    pub fn from_env() -> Self {
        Self::from_values(std::env::var(TOKEN_ENV).ok(), std::env::var(SAS_TOKEN_ENV).ok())
    }

    fn kind(&self) -> &'static str {
        match self {
            AzureCredential::Anonymous => "anonymous",
            AzureCredential::Bearer(_) => "bearer",
            AzureCredential::Sas(_) => "sas",
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Blob service connection settings.
#[derive(Debug, Clone)]
pub struct AzureBlobConfig {
    pub account: Url,
    pub credential: AzureCredential,
    pub api_version: String,
}

impl AzureBlobConfig {
    /// Anonymous access to `account`.
    pub fn new(account: Url) -> Self {
        AzureBlobConfig {
            account,
            credential: AzureCredential::Anonymous,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Access to `account` with credentials from the environment.
    pub fn from_env(account: Url) -> Self {
        Self::new(account).with_credential(AzureCredential::from_env())
    }

    pub fn with_credential(mut self, credential: AzureCredential) -> Self {
        self.credential = credential;
        self
    }
}

/// Blob service client for one storage account.
pub struct AzureBlobStore {
    config: AzureBlobConfig,
    http_client: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(config: AzureBlobConfig) -> StorageResult<Self> {
        let http_client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        debug!(
            account = %config.account,
            credential = ?config.credential,
            "created blob service client"
        );
        Ok(AzureBlobStore {
            config,
            http_client,
        })
    }

    fn with_sas(&self, mut url: Url) -> Url {
        if let AzureCredential::Sas(sas) = &self.config.credential {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{sas}"),
                _ => sas.clone(),
            };
            url.set_query(Some(&query));
        }
        url
    }

    /// URL of a tag-filtered listing page.
    pub fn filter_url(&self, filter: &str, marker: Option<&str>) -> Url {
        let mut url = self.config.account.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("comp", "blobs");
            pairs.append_pair("where", filter);
            if let Some(marker) = marker {
                pairs.append_pair("marker", marker);
            }
        }
        self.with_sas(url)
    }

    /// URL of a blob.
    pub fn blob_url(&self, container: &str, path: &str) -> StorageResult<Url> {
        let mut url = self.config.account.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::Http(format!("account URL {} cannot hold a path", self.config.account))
            })?
            .pop_if_empty()
            .push(container)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(self.with_sas(url))
    }

    fn headers(&self) -> StorageResult<HeaderMap> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| StorageError::Http(e.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ms-version",
            HeaderValue::from_str(&self.config.api_version).map_err(invalid)?,
        );
        headers.insert(
            "x-ms-client-request-id",
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).map_err(invalid)?,
        );
        if let AzureCredential::Bearer(token) = &self.config.credential {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(invalid)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn get(&self, url: Url) -> StorageResult<reqwest::Response> {
        let response = self
            .http_client
            .get(url.clone())
            .headers(self.headers()?)
            .send()
            .await?;
        Ok(response)
    }
}

/// Strip any SAS signature before a URL reaches an error message.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

async fn status_error(url: &Url, response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Status {
        url: redacted(url),
        status,
        body,
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn filter_blobs(
        &self,
        filter: &str,
        marker: Option<&str>,
    ) -> StorageResult<FilterBlobsPage> {
        let url = self.filter_url(filter, marker);
        let response = self.get(url.clone()).await?;
        if !response.status().is_success() {
            return Err(status_error(&url, response).await);
        }

        let body = response.text().await?;
        parse_filter_response(&body)
    }

    async fn download(&self, container: &str, path: &str) -> StorageResult<Vec<u8>> {
        let url = self.blob_url(container, path)?;
        let response = self.get(url.clone()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                container: container.to_string(),
                path: path.to_string(),
            }),
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            _ => Err(status_error(&url, response).await),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnumerationResults {
    #[serde(rename = "Blobs", default)]
    blobs: BlobList,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
struct BlobItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ContainerName")]
    container_name: String,
    #[serde(rename = "Tags", default)]
    tags: TagsElement,
}

#[derive(Debug, Default, Deserialize)]
struct TagsElement {
    #[serde(rename = "TagSet", default)]
    tag_set: TagSet,
}

#[derive(Debug, Default, Deserialize)]
struct TagSet {
    #[serde(rename = "Tag", default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value", default)]
    value: String,
}

/// Decode a Find Blobs by Tags response body.
pub fn parse_filter_response(body: &str) -> StorageResult<FilterBlobsPage> {
    let results: EnumerationResults = quick_xml::de::from_str(body)?;
    let blobs = results
        .blobs
        .items
        .into_iter()
        .map(|item| TaggedBlob {
            container_name: item.container_name,
            name: item.name,
            tags: item
                .tags
                .tag_set
                .tags
                .into_iter()
                .map(|tag| (tag.key, tag.value))
                .collect(),
        })
        .collect();

    Ok(FilterBlobsPage {
        blobs,
        next_marker: results.next_marker.filter(|m| !m.is_empty()),
    })
}
