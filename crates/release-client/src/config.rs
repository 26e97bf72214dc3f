//! Query configuration.
//!
//! Options move through three types, each only obtainable from the previous
//! one:
//!
//! ```text
//! RawListOptions --validate()--> ValidatedListOptions --complete()--> ReleaseLister
//! RawLastOptions --validate()--> ValidatedLastOptions --complete()--> LastDeploymentFinder
//! ```
//!
//! Validation never performs I/O; completion builds the storage client.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::azure::{AzureBlobConfig, AzureBlobStore};
use crate::error::{ConfigError, ReleaseError, Result};
use crate::list::{ReleaseLister, ReleaseQuery};
use crate::search::LastDeploymentFinder;
use crate::storage_traits::BlobStore;
use crate::window::TimeWindow;

pub const DEFAULT_STORAGE_ACCOUNT_URL: &str = "https://aroreleases.blob.core.windows.net/";
pub const DEFAULT_STORAGE_CONTAINER: &str = "releases";
pub const DEFAULT_SERVICE_GROUP_BASE: &str = "Microsoft.Azure.ARO.HCP";
/// Zero means "no limit".
pub const DEFAULT_LIMIT: usize = 0;

/// Length of the window used when `since` is not given.
pub fn default_window() -> Duration {
    Duration::days(7)
}

/// Backward search step used when none is given.
pub fn default_step() -> Duration {
    Duration::days(7)
}

/// Backward search budget used when none is given.
pub fn default_max_lookback() -> Duration {
    default_step() * 12
}

/// Storage account URL for an account name.
pub fn account_url(account_name: &str) -> String {
    format!("https://{account_name}.blob.core.windows.net/")
}

/// Deployment environment a release targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Stg,
    Int,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Stg => "stg",
            Environment::Int => "int",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prod" => Ok(Environment::Prod),
            "stg" => Ok(Environment::Stg),
            "int" => Ok(Environment::Int),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Unchecked options for listing release deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListOptions {
    pub storage_account_uri: String,
    pub storage_container_name: String,
    pub environment: String,
    /// Defaults to seven days before `until`
    pub since: Option<DateTime<Utc>>,
    /// Defaults to the moment of validation
    pub until: Option<DateTime<Utc>>,
    pub service_group_base: String,
    pub pipeline_revision: String,
    pub source_revision: String,
    pub include_components: bool,
    pub limit: usize,
}

impl Default for RawListOptions {
    fn default() -> Self {
        RawListOptions {
            storage_account_uri: DEFAULT_STORAGE_ACCOUNT_URL.to_string(),
            storage_container_name: DEFAULT_STORAGE_CONTAINER.to_string(),
            environment: Environment::Prod.to_string(),
            since: None,
            until: None,
            service_group_base: DEFAULT_SERVICE_GROUP_BASE.to_string(),
            pipeline_revision: String::new(),
            source_revision: String::new(),
            include_components: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn require(value: &str, name: &str, flag: &str) -> std::result::Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingOption {
            name: name.to_string(),
            flag: flag.to_string(),
        });
    }
    Ok(())
}

impl RawListOptions {
    /// Check the options, resolving defaults against the current instant.
    pub fn validate(self) -> std::result::Result<ValidatedListOptions, ConfigError> {
        self.validate_at(Utc::now())
    }

    /// Check the options, resolving defaults against `now`.
    pub fn validate_at(
        self,
        now: DateTime<Utc>,
    ) -> std::result::Result<ValidatedListOptions, ConfigError> {
        require(&self.storage_account_uri, "storage account", "account-name")?;
        require(&self.storage_container_name, "service container", "container")?;
        require(&self.environment, "environment", "environment")?;
        require(&self.service_group_base, "service group base", "service-group-base")?;

        let account = Url::parse(&self.storage_account_uri)
            .map_err(|e| ConfigError::InvalidAccount(format!("{}: {e}", self.storage_account_uri)))?;
        let environment: Environment = self.environment.parse()?;

        let until = self.until.unwrap_or(now);
        let since = match self.since {
            Some(since) => since,
            None => until
                .checked_sub_signed(default_window())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        };
        let window = TimeWindow::new(since, until)?;

        Ok(ValidatedListOptions {
            account,
            query: ReleaseQuery {
                container: self.storage_container_name,
                environment,
                service_group_base: self.service_group_base,
                window,
                pipeline_revision: self.pipeline_revision,
                source_revision: self.source_revision,
                include_components: self.include_components,
                limit: self.limit,
            },
        })
    }
}

/// Options that passed validation. Only produced by [`RawListOptions::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedListOptions {
    account: Url,
    query: ReleaseQuery,
}

impl ValidatedListOptions {
    pub fn account(&self) -> &Url {
        &self.account
    }

    pub fn query(&self) -> &ReleaseQuery {
        &self.query
    }

    /// Build the blob service client from the environment's credentials.
    pub fn complete(self) -> Result<ReleaseLister<AzureBlobStore>> {
        let store = AzureBlobStore::new(AzureBlobConfig::from_env(self.account.clone()))
            .map_err(ReleaseError::Client)?;
        Ok(self.complete_with(store))
    }

    /// Bind the options to an existing storage backend.
    pub fn complete_with<S: BlobStore>(self, store: S) -> ReleaseLister<S> {
        ReleaseLister::new(store, self.query)
    }
}

/// Unchecked options for the backward search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLastOptions {
    pub list: RawListOptions,
    pub step: Duration,
    pub max_lookback: Duration,
}

impl Default for RawLastOptions {
    fn default() -> Self {
        RawLastOptions {
            list: RawListOptions::default(),
            step: default_step(),
            max_lookback: default_max_lookback(),
        }
    }
}

impl RawLastOptions {
    pub fn validate(self) -> std::result::Result<ValidatedLastOptions, ConfigError> {
        self.validate_at(Utc::now())
    }

    pub fn validate_at(
        self,
        now: DateTime<Utc>,
    ) -> std::result::Result<ValidatedLastOptions, ConfigError> {
        let list = self.list.validate_at(now)?;

        if self.step <= Duration::zero() {
            return Err(ConfigError::NonPositiveStep);
        }
        if self.max_lookback <= Duration::zero() {
            return Err(ConfigError::NonPositiveLookback);
        }
        if self.max_lookback < self.step {
            return Err(ConfigError::LookbackShorterThanStep);
        }

        Ok(ValidatedLastOptions {
            list,
            step: self.step,
            max_lookback: self.max_lookback,
        })
    }
}

/// Backward search options that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedLastOptions {
    list: ValidatedListOptions,
    step: Duration,
    max_lookback: Duration,
}

impl ValidatedLastOptions {
    pub fn list(&self) -> &ValidatedListOptions {
        &self.list
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max_lookback(&self) -> Duration {
        self.max_lookback
    }

    pub fn complete(self) -> Result<LastDeploymentFinder<AzureBlobStore>> {
        let lister = self.list.complete()?;
        Ok(LastDeploymentFinder::new(lister, self.step, self.max_lookback))
    }

    pub fn complete_with<S: BlobStore>(self, store: S) -> LastDeploymentFinder<S> {
        LastDeploymentFinder::new(self.list.complete_with(store), self.step, self.max_lookback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("stg".parse::<Environment>().unwrap(), Environment::Stg);
        assert_eq!("int".parse::<Environment>().unwrap(), Environment::Int);
        assert_eq!(
            "dev".parse::<Environment>().unwrap_err(),
            ConfigError::InvalidEnvironment("dev".to_string())
        );
        assert!("PROD".parse::<Environment>().is_err());
    }

    #[test]
    fn test_defaults_resolve_window_against_now() {
        let now = at("2025-11-10T12:00:00Z");
        let validated = RawListOptions::default().validate_at(now).unwrap();
        let query = validated.query();

        assert_eq!(query.window.until(), now);
        assert_eq!(query.window.since(), at("2025-11-03T12:00:00Z"));
        assert_eq!(query.environment, Environment::Prod);
        assert_eq!(query.container, "releases");
        assert_eq!(query.limit, 0);
        assert_eq!(validated.account().host_str(), Some("aroreleases.blob.core.windows.net"));
    }

    #[test]
    fn test_since_defaults_relative_to_until() {
        let opts = RawListOptions {
            until: Some(at("2025-01-08T00:00:00Z")),
            ..Default::default()
        };
        let validated = opts.validate_at(at("2025-11-10T00:00:00Z")).unwrap();
        assert_eq!(validated.query().window.since(), at("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_missing_required_options() {
        let cases: Vec<(RawListOptions, &str)> = vec![
            (
                RawListOptions {
                    storage_account_uri: String::new(),
                    ..Default::default()
                },
                "account-name",
            ),
            (
                RawListOptions {
                    storage_container_name: " ".to_string(),
                    ..Default::default()
                },
                "container",
            ),
            (
                RawListOptions {
                    environment: String::new(),
                    ..Default::default()
                },
                "environment",
            ),
            (
                RawListOptions {
                    service_group_base: String::new(),
                    ..Default::default()
                },
                "service-group-base",
            ),
        ];

        for (opts, expected_flag) in cases {
            match opts.validate() {
                Err(ConfigError::MissingOption { flag, .. }) => assert_eq!(flag, expected_flag),
                other => panic!("expected missing {expected_flag}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_environment_and_account() {
        let opts = RawListOptions {
            environment: "dev".to_string(),
            ..Default::default()
        };
        assert_eq!(
            opts.validate().unwrap_err(),
            ConfigError::InvalidEnvironment("dev".to_string())
        );

        let opts = RawListOptions {
            storage_account_uri: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            opts.validate().unwrap_err(),
            ConfigError::InvalidAccount(_)
        ));
    }

    #[test]
    fn test_since_after_until_is_rejected() {
        let opts = RawListOptions {
            since: Some(at("2025-11-02T00:00:00Z")),
            until: Some(at("2025-11-01T00:00:00Z")),
            ..Default::default()
        };
        assert!(matches!(
            opts.validate().unwrap_err(),
            ConfigError::SinceAfterUntil { .. }
        ));
    }

    #[test]
    fn test_last_options_preconditions() {
        let check = |step: Duration, max_lookback: Duration| {
            RawLastOptions {
                step,
                max_lookback,
                ..Default::default()
            }
            .validate()
        };

        assert_eq!(
            check(Duration::zero(), Duration::days(3)).unwrap_err(),
            ConfigError::NonPositiveStep
        );
        assert_eq!(
            check(Duration::days(-1), Duration::days(3)).unwrap_err(),
            ConfigError::NonPositiveStep
        );
        assert_eq!(
            check(Duration::days(1), Duration::zero()).unwrap_err(),
            ConfigError::NonPositiveLookback
        );
        assert_eq!(
            check(Duration::days(2), Duration::days(1)).unwrap_err(),
            ConfigError::LookbackShorterThanStep
        );

        let ok = check(Duration::days(1), Duration::days(1)).unwrap();
        assert_eq!(ok.step(), Duration::days(1));
        assert_eq!(ok.max_lookback(), Duration::days(1));
        assert_eq!(ok.list().query().environment, Environment::Prod);
    }

    #[test]
    fn test_last_defaults() {
        let raw = RawLastOptions::default();
        assert_eq!(raw.step, Duration::days(7));
        assert_eq!(raw.max_lookback, Duration::days(84));
    }

    #[test]
    fn test_account_url() {
        assert_eq!(account_url("myacct"), "https://myacct.blob.core.windows.net/");
    }
}
