//! Turning candidates into deployment records.
//!
//! A release manifest that fails to decode only costs that one candidate.
//! Components are different: once requested, a missing or malformed
//! components manifest fails the whole call.

use tokio_util::sync::CancellationToken;

use crate::components::extract_components;
use crate::error::{ReleaseError, Result};
use crate::fetch::CandidateArtifact;
use crate::obs;
use crate::storage_traits::{cancellable, BlobStore};
use crate::types::ReleaseDeployment;

/// Fixed name of the per-region components manifest.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// `dirname(release_path)/region/config.yaml`
pub fn components_manifest_path(release_path: &str, region: &str) -> String {
    let dir = release_path
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or(".");
    [dir, region, CONFIG_FILE_NAME].join("/")
}

/// Downloads and decodes candidates from one container.
pub struct DeploymentResolver<'a, S: ?Sized> {
    store: &'a S,
    container: &'a str,
    include_components: bool,
}

impl<'a, S> DeploymentResolver<'a, S>
where
    S: BlobStore + ?Sized,
{
    pub fn new(store: &'a S, container: &'a str, include_components: bool) -> Self {
        Self {
            store,
            container,
            include_components,
        }
    }

    /// Resolve candidates one at a time, in the order given.
    pub async fn resolve_all(
        &self,
        candidates: &[CandidateArtifact],
        cancel: &CancellationToken,
    ) -> Result<Vec<ReleaseDeployment>> {
        let mut deployments = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(deployment) = self.resolve(&candidate.path, cancel).await? {
                deployments.push(deployment);
            }
        }
        Ok(deployments)
    }

    /// Resolve one release manifest. `Ok(None)` means it did not decode.
    pub async fn resolve(
        &self,
        release_path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ReleaseDeployment>> {
        let content = self.download(release_path, cancel).await?;

        let mut deployment = match ReleaseDeployment::from_release_yaml(&content) {
            Ok(deployment) => deployment,
            Err(e) => {
                obs::emit_release_skipped(release_path, &e);
                return Ok(None);
            }
        };

        if self.include_components {
            // First region only.
            if let Some(region) = deployment.primary_region() {
                let path = components_manifest_path(release_path, region);
                let content = self.download(&path, cancel).await?;
                deployment.components = extract_components(&content)
                    .map_err(|source| ReleaseError::Components { path, source })?;
            }
        }

        Ok(Some(deployment))
    }

    async fn download(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        cancellable(cancel, self.store.download(self.container, path))
            .await
            .map_err(|source| ReleaseError::Download {
                path: path.to_string(),
                source,
            })
    }
}
