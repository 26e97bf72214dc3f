//! Rendering deployments for the terminal or for other tools.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};

use crate::error::OutputError;
use crate::timeparse::format_relative_time;
use crate::types::ReleaseDeployment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    #[default]
    Human,
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "human" => Ok(OutputFormat::Human),
            other => Err(OutputError::InvalidFormat(other.to_string())),
        }
    }
}

/// Zone used for absolute timestamps in human output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    #[default]
    Utc,
    Local,
}

impl FromStr for DisplayZone {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(DisplayZone::Utc),
            "local" => Ok(DisplayZone::Local),
            _ => Err(OutputError::InvalidTimezone(s.to_string())),
        }
    }
}

impl DisplayZone {
    fn render(&self, t: DateTime<Utc>) -> String {
        const LAYOUT: &str = "%Y-%m-%d %H:%M:%S %Z";
        match self {
            DisplayZone::Utc => t.format(LAYOUT).to_string(),
            DisplayZone::Local => t.with_timezone(&Local).format(LAYOUT).to_string(),
        }
    }
}

/// Render `deployments` in the requested format.
///
/// `now` anchors the relative times in human output. Deployments whose
/// timestamp does not parse are left out of human output but keep their
/// position in the numbering.
pub fn format_deployments(
    deployments: &[ReleaseDeployment],
    format: OutputFormat,
    zone: DisplayZone,
    include_components: bool,
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(deployments)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(deployments)?),
        OutputFormat::Human => Ok(human(deployments, zone, include_components, now)),
    }
}

fn human(
    deployments: &[ReleaseDeployment],
    zone: DisplayZone,
    include_components: bool,
    now: DateTime<Utc>,
) -> String {
    let mut b = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(b, "Found {} deployment(s):\n", deployments.len());

    for (i, deployment) in deployments.iter().enumerate() {
        let Ok(timestamp) = DateTime::parse_from_rfc3339(&deployment.metadata.timestamp) else {
            continue;
        };
        let timestamp = timestamp.with_timezone(&Utc);

        let _ = writeln!(
            b,
            "{}. Deployment to {} was {} ago ({})",
            i + 1,
            deployment.target.environment,
            format_relative_time(now - timestamp),
            zone.render(timestamp)
        );
        let _ = writeln!(b, "   Release ID: {}", deployment.metadata.release_id);
        let _ = writeln!(b, "   Branch: {}", deployment.metadata.branch);
        if deployment.metadata.pull_request_id > 0 {
            let _ = writeln!(b, "   PR: #{}", deployment.metadata.pull_request_id);
        }
        if !deployment.target.region_configs.is_empty() {
            let _ = writeln!(b, "   Regions: [{}]", deployment.target.region_configs.join(" "));
        }
        if include_components && !deployment.components.is_empty() {
            let _ = writeln!(b, "   Components: {}", deployment.components.len());
        }
        b.push('\n');
    }
    b
}
