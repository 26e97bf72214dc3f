use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use release_client::config::{RawLastOptions, RawListOptions};
use release_client::fakes::MemoryBlobStore;
use release_client::{LastDeploymentFinder, ReleaseError};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CONTAINER: &str = "releases";
const ANCHOR: &str = "2025-11-10T00:00:00Z";

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("parse timestamp")
        .with_timezone(&Utc)
}

fn seed_release(store: &MemoryBlobStore, dir: &str, timestamp: &str) {
    let path = format!("{dir}/release.yaml");
    store.add_blob(
        CONTAINER,
        &path,
        &[
            ("environment", "int"),
            ("serviceGroupBase", "Microsoft.Azure.ARO.HCP"),
            ("serviceGroup", "Microsoft.Azure.ARO.HCP.Global"),
            ("timestamp", timestamp),
        ],
    );
    store.put_content(
        CONTAINER,
        &path,
        format!(
            "branch: main\ntimestamp: \"{timestamp}\"\nupstreamRevision: \"{dir}\"\nrevision: \"p\"\nenvironment: int\n"
        ),
    );
}

fn finder(
    store: &Arc<MemoryBlobStore>,
    step: Duration,
    max_lookback: Duration,
) -> LastDeploymentFinder<Arc<MemoryBlobStore>> {
    RawLastOptions {
        list: RawListOptions {
            environment: "int".to_string(),
            until: Some(at(ANCHOR)),
            ..Default::default()
        },
        step,
        max_lookback,
    }
    .validate()
    .expect("valid options")
    .complete_with(Arc::clone(store))
}

/// The `[since, until)` bounds embedded in each recorded filter expression.
fn searched_windows(store: &MemoryBlobStore) -> Vec<(String, String)> {
    store
        .filters()
        .iter()
        .map(|f| {
            let bound = |prefix: &str| {
                let start = f.find(prefix).expect("bound present") + prefix.len();
                f[start..start + 20].to_string()
            };
            (bound("\"timestamp\">='"), bound("\"timestamp\"<'"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_match_in_second_window() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_release(&store, "int/a", "2025-11-08T12:00:00Z");

    let finder = finder(&store, Duration::days(1), Duration::days(3));
    let found = finder
        .find_last(&CancellationToken::new())
        .await
        .expect("found");

    assert_eq!(found.metadata.timestamp, "2025-11-08T12:00:00Z");
    assert_eq!(store.filter_calls(), 2);
    assert_eq!(
        searched_windows(&store),
        vec![
            ("2025-11-09T00:00:00Z".to_string(), "2025-11-10T00:00:00Z".to_string()),
            ("2025-11-08T00:00:00Z".to_string(), "2025-11-09T00:00:00Z".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_newest_in_window_wins() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_release(&store, "int/old", "2025-11-09T01:00:00Z");
    seed_release(&store, "int/new", "2025-11-09T23:00:00Z");
    seed_release(&store, "int/mid", "2025-11-09T12:00:00Z");

    let found = finder(&store, Duration::days(1), Duration::days(3))
        .find_last(&CancellationToken::new())
        .await
        .expect("found");

    assert_eq!(found.metadata.release_id.source_revision, "int/new");
    assert_eq!(store.filter_calls(), 1);
}

#[tokio::test]
async fn test_release_at_anchor_is_excluded() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_release(&store, "int/a", ANCHOR);

    let err = finder(&store, Duration::days(1), Duration::days(1))
        .find_last(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_exhausted_search_reports_not_found() {
    let store = Arc::new(MemoryBlobStore::new());
    // Just beyond the lookback.
    seed_release(&store, "int/a", "2025-11-06T23:59:59Z");

    let err = finder(&store, Duration::days(1), Duration::days(3))
        .find_last(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match err {
        ReleaseError::NoDeploymentsFound { max_lookback } => {
            assert_eq!(max_lookback, Duration::days(3));
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(store.filter_calls(), 3);
    assert_eq!(store.download_calls(), 0);
}

#[tokio::test]
async fn test_uneven_lookback_overshoots_last_window() {
    let store = Arc::new(MemoryBlobStore::new());
    // Six days back: past the five-day lookback, inside the third window.
    seed_release(&store, "int/a", "2025-11-04T00:00:00Z");

    let found = finder(&store, Duration::days(2), Duration::days(5))
        .find_last(&CancellationToken::new())
        .await
        .expect("found");

    assert_eq!(found.metadata.timestamp, "2025-11-04T00:00:00Z");
    assert_eq!(store.filter_calls(), 3);
    assert_eq!(
        searched_windows(&store)[2],
        ("2025-11-04T00:00:00Z".to_string(), "2025-11-06T00:00:00Z".to_string())
    );
}

#[tokio::test]
async fn test_uneven_lookback_exhausts_after_three_windows() {
    let store = Arc::new(MemoryBlobStore::new());

    let err = finder(&store, Duration::days(2), Duration::days(5))
        .find_last(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.filter_calls(), 3);
}

#[tokio::test]
async fn test_configured_window_is_unchanged_by_search() {
    let store = Arc::new(MemoryBlobStore::new());
    let finder = finder(&store, Duration::days(1), Duration::days(3));
    let before = finder.lister().window();
    assert_eq!(finder.step(), Duration::days(1));
    assert_eq!(finder.max_lookback(), Duration::days(3));
    assert_eq!(finder.lister().query().environment.as_str(), "int");

    finder
        .find_last(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(finder.lister().window(), before);
    assert_eq!(before.until(), at(ANCHOR));
    assert_eq!(before.since(), at("2025-11-03T00:00:00Z"));
}

#[tokio::test]
async fn test_listing_error_stops_search() {
    let store = Arc::new(MemoryBlobStore::new());
    store.fail_filter_with("service unavailable");

    let err = finder(&store, Duration::days(1), Duration::days(3))
        .find_last(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(!err.is_not_found());
    assert!(matches!(err, ReleaseError::Filter(_)));
    assert_eq!(store.filter_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_search() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_release(&store, "int/a", "2025-11-09T12:00:00Z");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = finder(&store, Duration::days(1), Duration::days(3))
        .find_last(&cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}
