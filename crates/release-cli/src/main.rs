//! Release - Deployment History CLI
//!
//! The `release` command answers "what was deployed where, and when" from
//! the tagged release manifests in blob storage.
//!
//! ## Commands
//!
//! - `list`: Deployments in a time window, newest first
//! - `last`: The most recent deployment, searching backward step by step
//!
//! ## Exit codes
//!
//! - `0`: success
//! - `1`: any error
//! - `3`: `last` searched its whole lookback without a match

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use release_client::config::{
    account_url, RawLastOptions, RawListOptions, DEFAULT_SERVICE_GROUP_BASE,
    DEFAULT_STORAGE_ACCOUNT_URL, DEFAULT_STORAGE_CONTAINER,
};
use release_client::{
    format_deployments, parse_duration, parse_time_to_utc, BlobStore, DisplayZone,
    LastDeploymentFinder, OutputFormat, ReleaseDeployment, ReleaseLister,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

const EXIT_NOT_FOUND: u8 = 3;

#[derive(Parser)]
#[command(name = "release")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query release deployments recorded in blob storage", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List release deployments in a time window
    List {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Find the most recent release deployment
    Last {
        #[command(flatten)]
        query: QueryArgs,

        /// Step duration for the backward search (e.g. 1w, 3d, 48h)
        #[arg(long, value_parser = parse_duration, default_value = "7d")]
        step: Duration,

        /// Maximum lookback for the backward search (e.g. 12w, 90d)
        #[arg(long, value_parser = parse_duration, default_value = "12w")]
        max_lookback: Duration,
    },
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Name of the storage account to use (or a full account URL)
    #[arg(short = 'a', long, env = "RELEASE_ACCOUNT_NAME")]
    account_name: Option<String>,

    /// Name of the storage container to use
    #[arg(long, env = "RELEASE_CONTAINER", default_value = DEFAULT_STORAGE_CONTAINER)]
    container: String,

    /// Environment to query: prod, stg or int
    #[arg(short, long, env = "RELEASE_ENVIRONMENT", default_value = "prod")]
    environment: String,

    /// Start of the window: RFC3339, YYYY-MM-DD, or a duration ago (e.g. 2w)
    #[arg(short, long, value_parser = parse_time_to_utc)]
    since: Option<DateTime<Utc>>,

    /// End of the window, exclusive; same formats as --since
    #[arg(short, long, value_parser = parse_time_to_utc)]
    until: Option<DateTime<Utc>>,

    /// Service group base to use
    #[arg(long, env = "RELEASE_SERVICE_GROUP_BASE", default_value = DEFAULT_SERVICE_GROUP_BASE)]
    service_group_base: String,

    /// Only releases built by this pipeline revision
    #[arg(long = "pipeline-rev", default_value = "")]
    pipeline_revision: String,

    /// Only releases of this source revision
    #[arg(long = "source-rev", default_value = "")]
    source_revision: String,

    /// Include component digests in the output
    #[arg(long)]
    components: bool,

    /// Limit the number of deployments returned (0 for no limit)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Output format: json, yaml or human
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    /// Zone for timestamps in human output: utc or local
    #[arg(long, default_value = "utc")]
    timezone: DisplayZone,
}

impl QueryArgs {
    fn account_uri(&self) -> String {
        match self.account_name.as_deref() {
            None => DEFAULT_STORAGE_ACCOUNT_URL.to_string(),
            Some(name) if name.contains("://") => name.to_string(),
            Some(name) => account_url(name),
        }
    }

    fn to_raw(&self) -> RawListOptions {
        RawListOptions {
            storage_account_uri: self.account_uri(),
            storage_container_name: self.container.clone(),
            environment: self.environment.clone(),
            since: self.since,
            until: self.until,
            service_group_base: self.service_group_base.clone(),
            pipeline_revision: self.pipeline_revision.clone(),
            source_revision: self.source_revision.clone(),
            include_components: self.components,
            limit: self.limit,
        }
    }
}

/// What a successful command produced.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Printed,
    NothingFound,
}

fn exit_code(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::Printed) => 0,
        Ok(Outcome::NothingFound) => EXIT_NOT_FOUND,
        Err(_) => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    release_client::telemetry::init_tracing(cli.json, level);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!(event = "cli.interrupted", "cancelling in-flight query");
                cancel.cancel();
            }
        }
    });

    let result = match cli.command {
        Commands::List { query } => cmd_list(&query, &cancel).await,
        Commands::Last {
            query,
            step,
            max_lookback,
        } => cmd_last(&query, step, max_lookback, &cancel).await,
    };

    if let Err(err) = &result {
        eprintln!("Error: {err:#}");
    }
    ExitCode::from(exit_code(&result))
}

async fn cmd_list(query: &QueryArgs, cancel: &CancellationToken) -> Result<Outcome> {
    let lister = query
        .to_raw()
        .validate()
        .context("Invalid list options")?
        .complete()
        .context("Failed to set up storage client")?;

    let output = list_output(&lister, query, Utc::now(), cancel).await?;
    emit(&output);
    Ok(Outcome::Printed)
}

async fn list_output<S: BlobStore>(
    lister: &ReleaseLister<S>,
    query: &QueryArgs,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<String> {
    let deployments = lister
        .list_release_deployments(cancel)
        .await
        .context("Failed to list release deployments")?;
    render(&deployments, query, now)
}

async fn cmd_last(
    query: &QueryArgs,
    step: Duration,
    max_lookback: Duration,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let finder = RawLastOptions {
        list: query.to_raw(),
        step,
        max_lookback,
    }
    .validate()
    .context("Invalid last options")?
    .complete()
    .context("Failed to set up storage client")?;

    match last_output(&finder, query, Utc::now(), cancel).await? {
        Some(output) => {
            emit(&output);
            Ok(Outcome::Printed)
        }
        None => {
            eprintln!(
                "No deployments found in the last {} (searched back from {}).",
                release_client::format_relative_time(max_lookback),
                finder.lister().window().until().to_rfc3339()
            );
            Ok(Outcome::NothingFound)
        }
    }
}

/// `Ok(None)` when the search ran out of lookback.
async fn last_output<S: BlobStore>(
    finder: &LastDeploymentFinder<S>,
    query: &QueryArgs,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    match finder.find_last(cancel).await {
        Ok(deployment) => render(&[deployment], query, now).map(Some),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err).context("Failed to find last deployment"),
    }
}

fn render(deployments: &[ReleaseDeployment], query: &QueryArgs, now: DateTime<Utc>) -> Result<String> {
    format_deployments(deployments, query.output, query.timezone, query.components, now)
        .context("Failed to format results")
}

fn emit(output: &str) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use release_client::fakes::MemoryBlobStore;
    use std::sync::Arc;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("release").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    fn list_query(cli: Cli) -> QueryArgs {
        match cli.command {
            Commands::List { query } => query,
            Commands::Last { .. } => panic!("expected list"),
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_list_defaults() {
        let query = list_query(parse(&["list"]));
        let raw = query.to_raw();
        assert_eq!(raw.storage_account_uri, DEFAULT_STORAGE_ACCOUNT_URL);
        assert_eq!(raw.storage_container_name, "releases");
        assert_eq!(raw.environment, "prod");
        assert_eq!(raw.service_group_base, "Microsoft.Azure.ARO.HCP");
        assert_eq!(raw.since, None);
        assert_eq!(raw.until, None);
        assert_eq!(raw.limit, 0);
        assert!(!raw.include_components);
        assert_eq!(query.output, OutputFormat::Human);
        assert_eq!(query.timezone, DisplayZone::Utc);
    }

    #[test]
    fn test_list_flags() {
        let cli = parse(&[
            "list",
            "-a",
            "myacct",
            "-e",
            "int",
            "-s",
            "2025-11-01",
            "-u",
            "2025-11-08T02:00:00+02:00",
            "--pipeline-rev",
            "000779a4",
            "--source-rev",
            "43697e5fa59a",
            "--components",
            "-l",
            "5",
            "-o",
            "json",
            "--timezone",
            "local",
            "--verbose",
        ]);
        assert!(cli.verbose);
        let query = list_query(cli);
        let raw = query.to_raw();

        assert_eq!(raw.storage_account_uri, "https://myacct.blob.core.windows.net/");
        assert_eq!(raw.environment, "int");
        assert_eq!(raw.since, Some(at("2025-11-01T00:00:00Z")));
        assert_eq!(raw.until, Some(at("2025-11-08T00:00:00Z")));
        assert_eq!(raw.pipeline_revision, "000779a4");
        assert_eq!(raw.source_revision, "43697e5fa59a");
        assert!(raw.include_components);
        assert_eq!(raw.limit, 5);
        assert_eq!(query.output, OutputFormat::Json);
        assert_eq!(query.timezone, DisplayZone::Local);
    }

    #[test]
    fn test_account_url_passthrough() {
        let query = list_query(parse(&["list", "--account-name", "http://127.0.0.1:10000/devstore"]));
        assert_eq!(query.account_uri(), "http://127.0.0.1:10000/devstore");
    }

    #[test]
    fn test_last_durations() {
        match parse(&["last", "--step", "3d", "--max-lookback", "90d"]).command {
            Commands::Last {
                step, max_lookback, ..
            } => {
                assert_eq!(step, Duration::days(3));
                assert_eq!(max_lookback, Duration::days(90));
            }
            Commands::List { .. } => panic!("expected last"),
        }

        match parse(&["last"]).command {
            Commands::Last {
                step, max_lookback, ..
            } => {
                assert_eq!(step, Duration::days(7));
                assert_eq!(max_lookback, Duration::days(84));
            }
            Commands::List { .. } => panic!("expected last"),
        }
    }

    #[test]
    fn test_bad_values_are_rejected_by_parser() {
        let reject = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("release").chain(args.iter().copied())).is_err()
        };
        assert!(reject(&["list", "--since", "last tuesday"]));
        assert!(reject(&["list", "--output", "xml"]));
        assert!(reject(&["list", "--timezone", "mars"]));
        assert!(reject(&["last", "--step", "3 days"]));
        assert!(reject(&["list", "--limit", "-1"]));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(Outcome::Printed)), 0);
        assert_eq!(exit_code(&Ok(Outcome::NothingFound)), 3);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("boom"))), 1);
    }

    fn seeded_store() -> Arc<MemoryBlobStore> {
        let store = Arc::new(MemoryBlobStore::new());
        store.add_blob(
            "releases",
            "int/a/release.yaml",
            &[
                ("environment", "int"),
                ("serviceGroupBase", "Microsoft.Azure.ARO.HCP"),
                ("serviceGroup", "Microsoft.Azure.ARO.HCP.Global"),
                ("timestamp", "2025-11-05T00:00:00Z"),
            ],
        );
        store.put_content(
            "releases",
            "int/a/release.yaml",
            "branch: main\ntimestamp: \"2025-11-05T00:00:00Z\"\nupstreamRevision: src\nrevision: pipe\nenvironment: int\n",
        );
        store
    }

    #[tokio::test]
    async fn test_list_output_with_fake_store() {
        let query = list_query(parse(&[
            "list", "-e", "int", "-s", "2025-11-01", "-u", "2025-11-08",
        ]));
        let lister = query
            .to_raw()
            .validate()
            .unwrap()
            .complete_with(seeded_store());

        let out = list_output(&lister, &query, at("2025-11-08T00:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.starts_with("Found 1 deployment(s):"));
        assert!(out.contains("1. Deployment to int was 3 days ago (2025-11-05 00:00:00 UTC)"));
        assert!(out.contains("Release ID: src-pipe"));
    }

    #[tokio::test]
    async fn test_last_output_not_found() {
        let query = list_query(parse(&["list", "-e", "int", "-u", "2025-10-01"]));
        let finder = RawLastOptions {
            list: query.to_raw(),
            step: Duration::days(7),
            max_lookback: Duration::days(14),
        }
        .validate()
        .unwrap()
        .complete_with(seeded_store());

        let out = last_output(&finder, &query, at("2025-11-08T00:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn test_last_output_found() {
        let query = list_query(parse(&["list", "-e", "int", "-u", "2025-11-08", "-o", "json"]));
        let finder = RawLastOptions {
            list: query.to_raw(),
            step: Duration::days(1),
            max_lookback: Duration::days(7),
        }
        .validate()
        .unwrap()
        .complete_with(seeded_store());

        let out = last_output(&finder, &query, at("2025-11-08T00:00:00Z"), &CancellationToken::new())
            .await
            .unwrap()
            .expect("found");
        assert!(out.contains("\"sourceRevision\": \"src\""));
    }
}
