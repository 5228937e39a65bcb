//! Implementation of the `peerval assign` command.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use super::{open_engine, parse_uuid};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AssignmentRequest, Config, GeoPoint, GeographicScope, QuorumAssignment};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Submission to validate
    #[arg(long, value_parser = parse_uuid)]
    pub submission: Uuid,

    /// Submission type (e.g. post, listing)
    #[arg(long = "type")]
    pub submission_type: String,

    /// Agent that authored the submission; its validators are excluded
    #[arg(long, value_parser = parse_uuid)]
    pub author: Uuid,

    /// Content domain used for affinity ranking
    #[arg(long, default_value = "")]
    pub domain: String,

    /// Submission latitude
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Submission longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// Geographic scope: global or hyperlocal
    #[arg(long, default_value = "global")]
    pub scope: String,

    /// Region used for affinity ranking
    #[arg(long)]
    pub region: Option<String>,
}

impl AssignArgs {
    fn to_request(&self) -> Result<AssignmentRequest> {
        let scope = GeographicScope::parse_str(&self.scope)
            .with_context(|| format!("Invalid scope: {}. Must be global or hyperlocal", self.scope))?;
        let location = self.lat.zip(self.lng).map(|(lat, lng)| GeoPoint::new(lat, lng));
        if scope == GeographicScope::Hyperlocal && location.is_none() {
            anyhow::bail!("Hyperlocal submissions require --lat and --lng");
        }

        let mut request =
            AssignmentRequest::new(self.submission, &self.submission_type, self.author, &self.domain);
        request.location = location;
        request.scope = scope;
        request.region = self.region.clone();
        Ok(request)
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct AssignOutput {
    pub assignment: QuorumAssignment,
}

impl CommandOutput for AssignOutput {
    fn to_human(&self) -> String {
        let a = &self.assignment;
        let mut lines = vec![
            format!("Quorum for submission {} ({})", a.submission_id, a.composition.as_str()),
            format!("Expires: {}", a.expires_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ];
        for id in &a.local_validator_ids {
            lines.push(format!("  local   {id}{}", new_marker(a, *id)));
        }
        for id in &a.global_validator_ids {
            lines.push(format!("  global  {id}{}", new_marker(a, *id)));
        }
        if a.newly_assigned.is_empty() {
            lines.push("Quorum already complete; nothing assigned.".to_string());
        }
        if a.tier_fallback {
            lines.push("Note: apprentice validators were used to fill the quorum.".to_string());
        }
        lines.join("\n")
    }
}

fn new_marker(assignment: &QuorumAssignment, id: Uuid) -> &'static str {
    if assignment.newly_assigned.contains(&id) {
        "  (new)"
    } else {
        ""
    }
}

pub async fn execute(args: AssignArgs, config: &Config, json_mode: bool) -> Result<()> {
    let request = args.to_request()?;
    let engine = open_engine(config).await?;
    let assignment = engine.assignment.assign(&request).await?;
    output(&AssignOutput { assignment }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(scope: &str, lat: Option<f64>, lng: Option<f64>) -> AssignArgs {
        AssignArgs {
            submission: Uuid::new_v4(),
            submission_type: "post".to_string(),
            author: Uuid::new_v4(),
            domain: "food".to_string(),
            lat,
            lng,
            scope: scope.to_string(),
            region: None,
        }
    }

    #[test]
    fn test_hyperlocal_requires_location() {
        assert!(args("hyperlocal", None, None).to_request().is_err());

        let request = args("hyperlocal", Some(6.5), Some(3.4)).to_request().unwrap();
        assert_eq!(request.scope, GeographicScope::Hyperlocal);
        assert_eq!(request.local_search_point(), Some(GeoPoint::new(6.5, 3.4)));
    }

    #[test]
    fn test_invalid_scope_rejected() {
        assert!(args("regional", None, None).to_request().is_err());
    }
}
