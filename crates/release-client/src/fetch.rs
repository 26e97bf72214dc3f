//! Paginated candidate collection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{CandidateError, ReleaseError, Result};
use crate::filter::TAG_TIMESTAMP;
use crate::obs;
use crate::storage_traits::{cancellable, BlobStore, TaggedBlob};

/// Fixed name of the release manifest inside each release directory.
pub const RELEASE_FILE_NAME: &str = "release.yaml";

/// A listed release manifest that matched the filter, before download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArtifact {
    pub container_name: String,
    pub path: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CandidateArtifact {
    /// Map a listing entry, or explain why it cannot be used.
    pub fn from_blob(blob: TaggedBlob) -> std::result::Result<Self, CandidateError> {
        let raw = blob
            .tags
            .get(TAG_TIMESTAMP)
            .ok_or(CandidateError::MissingTimestamp)?;
        let timestamp = DateTime::parse_from_rfc3339(raw)
            .map_err(|source| CandidateError::BadTimestamp {
                raw: raw.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(CandidateArtifact {
            container_name: blob.container_name,
            path: blob.name,
            tags: blob.tags,
            timestamp,
        })
    }
}

fn is_release_manifest(path: &str) -> bool {
    path.strip_suffix(RELEASE_FILE_NAME)
        .is_some_and(|dir| dir.ends_with('/'))
}

/// Follow the continuation markers to the end of the listing.
///
/// Returns release manifests newest first, cut to `limit` when it is
/// non-zero. Entries without a usable `timestamp` tag are skipped; any
/// storage error aborts the whole fetch.
pub async fn fetch_candidates<S>(
    store: &S,
    filter: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<CandidateArtifact>>
where
    S: BlobStore + ?Sized,
{
    let mut candidates = Vec::new();
    let mut marker: Option<String> = None;
    let mut page_number = 0_usize;

    loop {
        let page = cancellable(cancel, store.filter_blobs(filter, marker.as_deref()))
            .await
            .map_err(ReleaseError::Filter)?;
        page_number += 1;
        obs::emit_page_fetched(page_number, page.blobs.len(), page.continuation().is_some());

        let next_marker = page.continuation().map(str::to_string);
        for blob in page.blobs {
            if !is_release_manifest(&blob.name) {
                continue;
            }
            let path = blob.name.clone();
            match CandidateArtifact::from_blob(blob) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => obs::emit_candidate_skipped(&path, &reason),
            }
        }

        match next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if limit > 0 {
        candidates.truncate(limit);
    }

    Ok(candidates)
}
