//! Release-Client: Tag-Filtered Release Deployment Lookup
//!
//! Release pipelines drop a `release.yaml` per deployment into a blob
//! container and tag it with environment, service group, revisions and a
//! timestamp. This crate answers two questions from those tags:
//!
//! - which releases were deployed in a time window (`ReleaseLister`)
//! - what was the most recent deployment (`LastDeploymentFinder`)
//!
//! ## Key Components
//!
//! - `ReleaseFilter`: composes the server-side tag filter expression
//! - `BlobStore`: the storage seam, with `AzureBlobStore` and the in-memory
//!   `MemoryBlobStore` behind it
//! - `extract_components`: flattens per-region component manifests
//! - `RawListOptions` / `RawLastOptions`: validate-then-complete configuration

pub mod azure;
pub mod components;
pub mod config;
mod error;
pub mod fakes;
pub mod fetch;
pub mod filter;
pub mod list;
pub mod obs;
pub mod output;
pub mod resolve;
pub mod search;
pub mod storage_traits;
pub mod telemetry;
pub mod timeparse;
pub mod types;
pub mod window;

pub use azure::{AzureBlobConfig, AzureBlobStore, AzureCredential};
pub use components::extract_components;
pub use config::{
    Environment, RawLastOptions, RawListOptions, ValidatedLastOptions, ValidatedListOptions,
};
pub use error::{
    CandidateError, ComponentsError, ConfigError, OutputError, ReleaseError, Result, StorageError,
    TimeParseError,
};
pub use fakes::MemoryBlobStore;
pub use fetch::CandidateArtifact;
pub use filter::ReleaseFilter;
pub use list::{ReleaseLister, ReleaseQuery};
pub use output::{format_deployments, DisplayZone, OutputFormat};
pub use search::LastDeploymentFinder;
pub use storage_traits::{BlobStore, FilterBlobsPage, StorageResult, TaggedBlob};
pub use timeparse::{format_relative_time, parse_duration, parse_time_to_utc};
pub use types::{Components, DeploymentTarget, ReleaseDeployment, ReleaseId, ReleaseMetadata};
pub use window::TimeWindow;
