//! Storage trait definitions
//!
//! The query pipeline needs only two capabilities from a blob service:
//! - `filter_blobs`: tag-filtered listing, one page per call
//! - `download`: fetch a blob's bytes by path
//!
//! Pagination is driven by the caller with the opaque continuation marker
//! the backend hands back. In-memory fakes are provided for testing via the
//! `fakes` module.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A blob returned by a tag-filtered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedBlob {
    pub container_name: String,
    pub name: String,
    /// Tags echoed by the service. Only keys referenced by the filter are
    /// guaranteed to be present.
    pub tags: BTreeMap<String, String>,
}

/// One page of a tag-filtered listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBlobsPage {
    pub blobs: Vec<TaggedBlob>,
    /// Continuation marker; `None` (or empty) once the listing is exhausted.
    pub next_marker: Option<String>,
}

impl FilterBlobsPage {
    /// The marker to pass to the next call, if any.
    pub fn continuation(&self) -> Option<&str> {
        self.next_marker.as_deref().filter(|m| !m.is_empty())
    }
}

/// Read-only blob service.
///
/// Implementations surface failures as-is; retry policy belongs to callers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List blobs across the account matching a tag filter expression.
    async fn filter_blobs(&self, filter: &str, marker: Option<&str>)
        -> StorageResult<FilterBlobsPage>;

    /// Download a blob's full content.
    async fn download(&self, container: &str, path: &str) -> StorageResult<Vec<u8>>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    async fn filter_blobs(
        &self,
        filter: &str,
        marker: Option<&str>,
    ) -> StorageResult<FilterBlobsPage> {
        (**self).filter_blobs(filter, marker).await
    }

    async fn download(&self, container: &str, path: &str) -> StorageResult<Vec<u8>> {
        (**self).download(container, path).await
    }
}

/// Run a storage call, abandoning it as soon as `cancel` fires.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_treats_empty_marker_as_done() {
        let mut page = FilterBlobsPage::default();
        assert_eq!(page.continuation(), None);

        page.next_marker = Some(String::new());
        assert_eq!(page.continuation(), None);

        page.next_marker = Some("2!token".to_string());
        assert_eq!(page.continuation(), Some("2!token"));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok::<_, StorageError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = cancellable(&cancel, std::future::pending::<StorageResult<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }
}
