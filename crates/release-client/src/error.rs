//! Error types for release-client

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors produced while parsing human time expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("invalid duration: {0} (expected format: 2h, 30m, 1d, 2w, etc.)")]
    InvalidDuration(String),

    #[error("invalid number in duration: {0}")]
    InvalidNumber(String),

    #[error("invalid time: {0} (expected RFC3339, YYYY-MM-DD, or duration like 1d, 2w, 12h)")]
    InvalidTime(String),
}

/// Configuration errors. Always raised before any storage call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the {name} must be provided with --{flag}")]
    MissingOption { name: String, flag: String },

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("since ({since}) must be before until ({until})")]
    SinceAfterUntil {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("step must be greater than zero")]
    NonPositiveStep,

    #[error("max-lookback must be greater than zero")]
    NonPositiveLookback,

    #[error("max-lookback must be greater than or equal to step")]
    LookbackShorterThanStep,

    #[error("invalid storage account: {0}")]
    InvalidAccount(String),
}

/// Errors surfaced by a blob storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Transport-level failure (connection, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("storage request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The service answered with a body we could not decode
    #[error("failed to decode storage response: {0}")]
    Decode(String),

    /// Blob does not exist
    #[error("blob not found: {container}/{path}")]
    NotFound { container: String, path: String },

    /// The caller's cancellation token fired during the call
    #[error("operation cancelled")]
    Cancelled,
}

// The request URL can carry a SAS signature, so it never reaches the message.
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Http(err.without_url().to_string())
    }
}

impl From<quick_xml::DeError> for StorageError {
    fn from(err: quick_xml::DeError) -> Self {
        StorageError::Decode(err.to_string())
    }
}

/// Why a listed release manifest cannot be ranked.
#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("missing timestamp tag")]
    MissingTimestamp,

    #[error("failed to parse timestamp {raw:?}: {source}")]
    BadTimestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Errors produced while extracting components from a manifest tree.
#[derive(Error, Debug)]
pub enum ComponentsError {
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("parsed YAML document is empty")]
    EmptyDocument,

    #[error("scalar value {value:?} has no path in the document")]
    PathlessLeaf { value: String },
}

/// Errors produced while rendering query results.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("invalid output format: {0} (expected json, yaml or human)")]
    InvalidFormat(String),

    #[error("invalid timezone: {0} (expected utc or local)")]
    InvalidTimezone(String),

    #[error("failed to format results: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to format results: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level errors for release queries.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create storage client: {0}")]
    Client(#[source] StorageError),

    #[error("failed to filter blobs: {0}")]
    Filter(#[source] StorageError),

    #[error("failed to download blob {path}: {source}")]
    Download {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to download and parse components from {path}: {source}")]
    Components {
        path: String,
        #[source]
        source: ComponentsError,
    },

    /// The backward search walked the whole lookback without a match.
    /// This is an expected outcome, not a failure of the system.
    #[error("no deployments found in lookback window of {}h", .max_lookback.num_hours())]
    NoDeploymentsFound { max_lookback: Duration },
}

impl ReleaseError {
    /// Whether this error reports an empty search rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReleaseError::NoDeploymentsFound { .. })
    }

    /// Whether the underlying storage call observed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ReleaseError::Filter(StorageError::Cancelled)
                | ReleaseError::Download {
                    source: StorageError::Cancelled,
                    ..
                }
        )
    }
}

/// Result type for release queries
pub type Result<T> = std::result::Result<T, ReleaseError>;
