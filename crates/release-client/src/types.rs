//! Release deployment records.
//!
//! A [`ReleaseDeployment`] is rebuilt from one `release.yaml` artifact
//! (see [`ReleaseManifest`]) plus, optionally, the per-region components
//! manifest that sits next to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flattened component name (e.g. `image.backend`) to image digest.
pub type Components = BTreeMap<String, String>;

/// The first-class identifier for a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseId {
    pub source_revision: String,
    pub pipeline_revision: String,
}

impl ReleaseId {
    pub fn new(source_revision: impl Into<String>, pipeline_revision: impl Into<String>) -> Self {
        Self {
            source_revision: source_revision.into(),
            pipeline_revision: pipeline_revision.into(),
        }
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source_revision, self.pipeline_revision)
    }
}

/// How and when a release was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetadata {
    pub release_id: ReleaseId,
    pub branch: String,
    /// RFC 3339, as written by the release pipeline
    pub timestamp: String,
    pub pull_request_id: i64,
    pub service_group: String,
    pub service_group_base: String,
}

/// Where a release is being deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTarget {
    pub cloud: String,
    pub environment: String,
    pub region_configs: Vec<String>,
}

/// A release deployed to a specific target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDeployment {
    pub metadata: ReleaseMetadata,
    pub target: DeploymentTarget,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: Components,
}

impl ReleaseDeployment {
    /// Decode a `release.yaml` document.
    pub fn from_release_yaml(content: &[u8]) -> Result<Self, serde_yaml::Error> {
        let manifest: ReleaseManifest = serde_yaml::from_slice(content)?;
        Ok(manifest.into())
    }

    /// Region whose components manifest describes this deployment.
    ///
    /// Only the first region is consulted; releases are assumed to target a
    /// single region.
    pub fn primary_region(&self) -> Option<&str> {
        self.target.region_configs.first().map(String::as_str)
    }
}

/// On-disk layout of `release.yaml`.
///
/// Pipelines still write the legacy revision keys: `upstreamRevision` is the
/// source revision and `revision` the pipeline revision. The canonical keys
/// win when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseManifest {
    pub branch: String,
    pub timestamp: String,
    pub pull_request_id: i64,
    pub revision: Option<String>,
    pub upstream_revision: Option<String>,
    pub source_revision: Option<String>,
    pub pipeline_revision: Option<String>,
    pub cloud: String,
    pub environment: String,
    pub region_configs: Vec<String>,
    pub service_group_base: String,
    pub service_group: String,
}

impl From<ReleaseManifest> for ReleaseDeployment {
    fn from(file: ReleaseManifest) -> Self {
        let source_revision = file
            .source_revision
            .or(file.upstream_revision)
            .unwrap_or_default();
        let pipeline_revision = file
            .pipeline_revision
            .or(file.revision)
            .unwrap_or_default();

        ReleaseDeployment {
            metadata: ReleaseMetadata {
                release_id: ReleaseId {
                    source_revision,
                    pipeline_revision,
                },
                branch: file.branch,
                timestamp: file.timestamp,
                pull_request_id: file.pull_request_id,
                service_group: file.service_group,
                service_group_base: file.service_group_base,
            },
            target: DeploymentTarget {
                cloud: file.cloud,
                environment: file.environment,
                region_configs: file.region_configs,
            },
            components: Components::new(),
        }
    }
}
