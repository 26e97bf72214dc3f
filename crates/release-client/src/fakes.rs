//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryBlobStore` evaluates the same tag filter grammar the blob service
//! accepts (`@container='c' AND "key" op 'value'`, ops `=`, `>`, `>=`, `<`,
//! `<=`) with lexicographic comparison, and echoes back only the tag keys
//! the filter mentions, as the real service does.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Clone)]
struct StoredBlob {
    container: String,
    name: String,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Subject {
    Container,
    Tag(String),
}

#[derive(Debug, Clone)]
struct Clause {
    subject: Subject,
    op: String,
    value: String,
}

impl Clause {
    fn matches(&self, blob: &StoredBlob) -> bool {
        let actual = match &self.subject {
            Subject::Container => blob.container.as_str(),
            Subject::Tag(key) => match blob.tags.get(key) {
                Some(v) => v.as_str(),
                None => return false,
            },
        };
        let expected = self.value.as_str();
        match self.op.as_str() {
            "=" => actual == expected,
            ">" => actual > expected,
            ">=" => actual >= expected,
            "<" => actual < expected,
            "<=" => actual <= expected,
            _ => false,
        }
    }
}

fn clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^(?:@container|"([^"]+)")\s*(>=|<=|=|>|<)\s*'([^']*)'$"#)
            .expect("static regex")
    })
}

fn parse_filter(filter: &str) -> StorageResult<Vec<Clause>> {
    filter
        .split(" AND ")
        .map(|raw| {
            let raw = raw.trim();
            let caps = clause_pattern()
                .captures(raw)
                .ok_or_else(|| StorageError::Status {
                    url: "memory://".to_string(),
                    status: 400,
                    body: format!("invalid filter clause: {raw}"),
                })?;
            Ok(Clause {
                subject: match caps.get(1) {
                    Some(key) => Subject::Tag(key.as_str().to_string()),
                    None => Subject::Container,
                },
                op: caps[2].to_string(),
                value: caps[3].to_string(),
            })
        })
        .collect()
}

/// In-memory blob service.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: Mutex<Vec<StoredBlob>>,
    contents: Mutex<HashMap<(String, String), Vec<u8>>>,
    page_size: usize,
    filters: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
    filter_failure: Mutex<Option<String>>,
    download_failures: Mutex<HashMap<String, String>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        MemoryBlobStore {
            blobs: Mutex::default(),
            contents: Mutex::default(),
            page_size: 5000,
            filters: Mutex::default(),
            downloads: Mutex::default(),
            filter_failure: Mutex::default(),
            download_failures: Mutex::default(),
        }
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return at most `page_size` blobs per listing call.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Register a blob for tag-filtered listings.
    pub fn add_blob(&self, container: &str, name: &str, tags: &[(&str, &str)]) {
        self.blobs.lock().unwrap().push(StoredBlob {
            container: container.to_string(),
            name: name.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    /// Set the bytes returned when `path` is downloaded.
    pub fn put_content(&self, container: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.contents
            .lock()
            .unwrap()
            .insert((container.to_string(), path.to_string()), content.into());
    }

    /// Make every listing call fail.
    pub fn fail_filter_with(&self, message: &str) {
        *self.filter_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make downloads of `path` fail regardless of stored content.
    pub fn fail_download_of(&self, path: &str, message: &str) {
        self.download_failures
            .lock()
            .unwrap()
            .insert(path.to_string(), message.to_string());
    }

    /// Number of listing calls made so far, one per page.
    pub fn filter_calls(&self) -> usize {
        self.filters.lock().unwrap().len()
    }

    /// Every filter expression received, in call order.
    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }

    pub fn download_calls(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }

    /// Every downloaded path, in call order.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn filter_blobs(
        &self,
        filter: &str,
        marker: Option<&str>,
    ) -> StorageResult<FilterBlobsPage> {
        self.filters.lock().unwrap().push(filter.to_string());
        if let Some(message) = self.filter_failure.lock().unwrap().clone() {
            return Err(StorageError::Http(message));
        }

        let clauses = parse_filter(filter)?;
        let start = match marker {
            Some(m) => m
                .parse::<usize>()
                .map_err(|_| StorageError::Decode(format!("invalid marker: {m}")))?,
            None => 0,
        };

        let blobs = self.blobs.lock().unwrap();
        let matching: Vec<&StoredBlob> = blobs
            .iter()
            .filter(|blob| clauses.iter().all(|c| c.matches(blob)))
            .collect();

        let page = matching
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|blob| TaggedBlob {
                container_name: blob.container.clone(),
                name: blob.name.clone(),
                tags: blob
                    .tags
                    .iter()
                    .filter(|(key, _)| {
                        clauses
                            .iter()
                            .any(|c| c.subject == Subject::Tag(key.to_string()))
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
            .collect();

        let end = start + self.page_size;
        Ok(FilterBlobsPage {
            blobs: page,
            next_marker: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, container: &str, path: &str) -> StorageResult<Vec<u8>> {
        self.downloads.lock().unwrap().push(path.to_string());
        if let Some(message) = self.download_failures.lock().unwrap().get(path) {
            return Err(StorageError::Http(message.clone()));
        }

        self.contents
            .lock()
            .unwrap()
            .get(&(container.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                path: path.to_string(),
            })
    }
}
