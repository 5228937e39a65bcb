//! Implementation of the `peerval ground-truth` command.

use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use super::{open_engine, parse_recommendation, parse_uuid};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, Recommendation, TierChange};

#[derive(Args, Debug)]
pub struct GroundTruthArgs {
    #[arg(long, value_parser = parse_uuid)]
    pub submission: Uuid,

    #[arg(long = "type")]
    pub submission_type: String,

    /// Final moderation decision: approved, rejected or flagged
    #[arg(long, value_parser = parse_recommendation)]
    pub decision: Recommendation,
}

#[derive(Debug, serde::Serialize)]
pub struct GroundTruthOutput {
    pub submission_id: Uuid,
    pub recorded: bool,
    pub decision: Option<Recommendation>,
    pub scored: usize,
    pub tier_changes: Vec<TierChange>,
}

impl CommandOutput for GroundTruthOutput {
    fn to_human(&self) -> String {
        let decision = self.decision.map_or("-", |d| d.as_str());
        let mut lines = vec![if self.recorded {
            format!("Recorded ground truth '{decision}' for submission {}", self.submission_id)
        } else {
            format!("Ground truth already on record for {} ('{decision}')", self.submission_id)
        }];
        lines.push(format!("Scored {} response(s)", self.scored));
        for change in &self.tier_changes {
            lines.push(format!(
                "  validator {} {} -> {}",
                change.validator_id,
                change.from_tier.as_str(),
                change.to_tier.as_str()
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: GroundTruthArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let outcome = engine
        .intake
        .record_ground_truth(args.submission, &args.submission_type, args.decision)
        .await?;
    let out = GroundTruthOutput {
        submission_id: args.submission,
        recorded: outcome.recorded,
        decision: outcome.decision,
        scored: outcome.scored,
        tier_changes: outcome.tier_changes,
    };
    output(&out, json_mode);
    Ok(())
}
