//! Server-side tag filter expressions.
//!
//! Produces the Blob service "Find Blobs by Tags" grammar:
//!
//! ```text
//! @container='releases' AND "environment"='int' AND "serviceGroupBase"='Microsoft.Azure.ARO.HCP'
//!   AND "timestamp">='2025-10-16T00:00:00Z' AND "timestamp"<'2025-10-31T00:00:00Z'
//!   AND "serviceGroup">=''
//! ```
//!
//! `"serviceGroup">=''` always matches; it is there so the service echoes the
//! `serviceGroup` tag back in the listing.

use chrono::SecondsFormat;

use crate::config::Environment;
use crate::window::TimeWindow;

pub const TAG_TIMESTAMP: &str = "timestamp";
pub const TAG_ENVIRONMENT: &str = "environment";
pub const TAG_SERVICE_GROUP_BASE: &str = "serviceGroupBase";
pub const TAG_SERVICE_GROUP: &str = "serviceGroup";
pub const TAG_PIPELINE_REVISION: &str = "revision";
pub const TAG_SOURCE_REVISION: &str = "upstreamRevision";

/// Comparison operators the tag filter grammar supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    GreaterOrEqual,
    Less,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::Less => "<",
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `"key"<op>'value'` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    pub key: &'static str,
    pub operator: FilterOperator,
    pub value: String,
    pub enabled: bool,
}

impl FilterPredicate {
    fn new(key: &'static str, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            key,
            operator,
            value: value.into(),
            enabled: true,
        }
    }

    fn when_set(key: &'static str, value: &str) -> Self {
        Self {
            enabled: !value.is_empty(),
            ..Self::new(key, FilterOperator::Eq, value)
        }
    }
}

impl std::fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"{}'{}'", self.key, self.operator, self.value)
    }
}

/// Inputs to one filter expression.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseFilter<'a> {
    pub container: &'a str,
    pub environment: Environment,
    pub service_group_base: &'a str,
    pub window: TimeWindow,
    pub pipeline_revision: &'a str,
    pub source_revision: &'a str,
}

impl ReleaseFilter<'_> {
    /// Tag clauses in their fixed order, disabled ones included.
    pub fn predicates(&self) -> Vec<FilterPredicate> {
        let since = self
            .window
            .since()
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let until = self
            .window
            .until()
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        vec![
            FilterPredicate::new(TAG_ENVIRONMENT, FilterOperator::Eq, self.environment.as_str()),
            FilterPredicate::new(
                TAG_SERVICE_GROUP_BASE,
                FilterOperator::Eq,
                self.service_group_base,
            ),
            FilterPredicate::new(TAG_TIMESTAMP, FilterOperator::GreaterOrEqual, since),
            FilterPredicate::new(TAG_TIMESTAMP, FilterOperator::Less, until),
            FilterPredicate::new(TAG_SERVICE_GROUP, FilterOperator::GreaterOrEqual, ""),
            FilterPredicate::when_set(TAG_PIPELINE_REVISION, self.pipeline_revision),
            FilterPredicate::when_set(TAG_SOURCE_REVISION, self.source_revision),
        ]
    }

    /// Render the full expression, container clause first.
    pub fn build(&self) -> String {
        let mut clauses = vec![format!("@container='{}'", self.container)];
        clauses.extend(
            self.predicates()
                .iter()
                .filter(|p| p.enabled)
                .map(ToString::to_string),
        );
        let filter = clauses.join(" AND ");
        tracing::debug!(filter = %filter, "built tag filter");
        filter
    }
}
