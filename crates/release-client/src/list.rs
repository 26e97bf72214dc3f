//! Listing release deployments in a time window.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Environment;
use crate::error::Result;
use crate::fetch::fetch_candidates;
use crate::filter::ReleaseFilter;
use crate::obs::{self, QuerySpan};
use crate::resolve::DeploymentResolver;
use crate::storage_traits::BlobStore;
use crate::types::ReleaseDeployment;
use crate::window::TimeWindow;

/// Everything a listing needs besides the storage client.
#[derive(Debug, Clone)]
pub struct ReleaseQuery {
    pub container: String,
    pub environment: Environment,
    pub service_group_base: String,
    pub window: TimeWindow,
    pub pipeline_revision: String,
    pub source_revision: String,
    pub include_components: bool,
    /// Zero means unlimited
    pub limit: usize,
}

impl ReleaseQuery {
    /// The filter for this query over an arbitrary window.
    pub fn filter_for(&self, window: TimeWindow) -> ReleaseFilter<'_> {
        ReleaseFilter {
            container: &self.container,
            environment: self.environment,
            service_group_base: &self.service_group_base,
            window,
            pipeline_revision: &self.pipeline_revision,
            source_revision: &self.source_revision,
        }
    }
}

/// A validated query bound to a storage backend.
pub struct ReleaseLister<S> {
    store: S,
    query: ReleaseQuery,
}

impl<S: BlobStore> ReleaseLister<S> {
    pub fn new(store: S, query: ReleaseQuery) -> Self {
        Self { store, query }
    }

    pub fn query(&self) -> &ReleaseQuery {
        &self.query
    }

    pub fn window(&self) -> TimeWindow {
        self.query.window
    }

    /// List deployments in the configured window, newest first.
    pub async fn list_release_deployments(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReleaseDeployment>> {
        self.list_in_window(self.query.window, cancel).await
    }

    /// List deployments in `window`, newest first, ignoring the configured
    /// window. The query itself is left untouched.
    pub async fn list_in_window(
        &self,
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReleaseDeployment>> {
        let _span = QuerySpan::enter(self.query.environment.as_str(), &window);
        let started = Instant::now();

        let filter = self.query.filter_for(window).build();
        obs::emit_query_started(&self.query.container, &filter);

        let candidates = fetch_candidates(&self.store, &filter, self.query.limit, cancel).await?;

        let resolver = DeploymentResolver::new(
            &self.store,
            &self.query.container,
            self.query.include_components,
        );
        let deployments = resolver.resolve_all(&candidates, cancel).await?;

        obs::emit_query_finished(
            candidates.len(),
            deployments.len(),
            started.elapsed().as_millis() as u64,
        );
        Ok(deployments)
    }
}
