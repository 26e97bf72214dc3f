//! Structured observability hooks for release queries.
//!
//! Every event carries an `event` field so log pipelines can match on it
//! regardless of message text. Per-candidate skips are warnings; everything
//! else is `info!` or `debug!`.

use tracing::{debug, info, warn};

use crate::window::TimeWindow;

/// RAII guard that enters a query-scoped tracing span.
///
/// ```ignore
/// let _span = QuerySpan::enter("int", &window);
/// // events below carry environment = "int" and the window bounds
/// ```
pub struct QuerySpan {
    _span: tracing::span::EnteredSpan,
}

impl QuerySpan {
    pub fn enter(environment: &str, window: &TimeWindow) -> Self {
        let span = tracing::info_span!(
            "release.query",
            environment = %environment,
            window = %window,
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a listing query is about to hit storage.
pub fn emit_query_started(container: &str, filter: &str) {
    info!(event = "query.started", container = %container, filter = %filter);
}

/// Emit event: one page of tag-filtered results arrived.
pub fn emit_page_fetched(page: usize, blobs: usize, has_more: bool) {
    debug!(event = "query.page_fetched", page = page, blobs = blobs, has_more = has_more);
}

/// Emit event: a listed blob was dropped before download.
pub fn emit_candidate_skipped(path: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "query.candidate_skipped", path = %path, reason = %reason);
}

/// Emit event: a release manifest downloaded but did not decode.
pub fn emit_release_skipped(path: &str, error: &dyn std::fmt::Display) {
    warn!(event = "query.release_skipped", path = %path, error = %error);
}

/// Emit event: a listing query finished.
pub fn emit_query_finished(candidates: usize, deployments: usize, duration_ms: u64) {
    info!(
        event = "query.finished",
        candidates = candidates,
        deployments = deployments,
        duration_ms = duration_ms,
    );
}

/// Emit event: the backward search is probing a window.
pub fn emit_search_window(iteration: u32, window: &TimeWindow) {
    info!(event = "search.window", iteration = iteration, window = %window);
}

/// Emit event: the backward search found a deployment.
pub fn emit_search_found(iteration: u32, timestamp: &str) {
    info!(event = "search.found", iteration = iteration, timestamp = %timestamp);
}

/// Emit event: the backward search walked its whole budget.
pub fn emit_search_exhausted(iterations: u32, max_lookback_hours: i64) {
    info!(
        event = "search.exhausted",
        iterations = iterations,
        max_lookback_hours = max_lookback_hours,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_query_span_create() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let _span = QuerySpan::enter("int", &window);
        emit_search_window(1, &window);
    }
}
