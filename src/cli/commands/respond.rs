//! Implementation of the `peerval respond` command.

use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use super::{open_engine, parse_recommendation, parse_uuid};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{
    AccuracyMetrics, Config, ConsensusResult, Evaluation, Recommendation, TierChange, QUORUM_SIZE,
};
use crate::services::{AggregationOutcome, ResponseOutcome};

#[derive(Args, Debug)]
pub struct RespondArgs {
    #[arg(long, value_parser = parse_uuid)]
    pub submission: Uuid,

    #[arg(long, value_parser = parse_uuid)]
    pub validator: Uuid,

    /// approved, rejected or flagged
    #[arg(long, value_parser = parse_recommendation)]
    pub recommendation: Recommendation,
}

#[derive(Debug, serde::Serialize)]
pub struct RespondOutput {
    pub evaluation: Evaluation,
    pub metrics: Option<AccuracyMetrics>,
    pub tier_change: Option<TierChange>,
    /// Responses still missing before the quorum can be aggregated.
    pub awaiting: Option<usize>,
    pub consensus: Option<ConsensusResult>,
}

impl From<ResponseOutcome> for RespondOutput {
    fn from(outcome: ResponseOutcome) -> Self {
        let awaiting = match &outcome.consensus {
            AggregationOutcome::QuorumIncomplete { completed } => Some(QUORUM_SIZE.saturating_sub(*completed)),
            AggregationOutcome::Created(_) | AggregationOutcome::AlreadyDecided => None,
        };
        Self {
            consensus: outcome.consensus.result().cloned(),
            evaluation: outcome.evaluation,
            metrics: outcome.metrics,
            tier_change: outcome.tier_change,
            awaiting,
        }
    }
}

impl CommandOutput for RespondOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Recorded {} from validator {} for submission {}",
            self.evaluation.recommendation.map_or("-", |r| r.as_str()),
            self.evaluation.validator_id,
            self.evaluation.submission_id
        )];
        if let Some(m) = &self.metrics {
            lines.push(format!(
                "Accuracy over last {}: precision {:.4}, recall {:.4}, f1 {:.4}",
                m.sample_size, m.precision, m.recall, m.f1_score
            ));
        }
        if let Some(change) = &self.tier_change {
            lines.push(format!("Tier changed: {} -> {}", change.from_tier.as_str(), change.to_tier.as_str()));
        }
        match (&self.consensus, self.awaiting) {
            (Some(result), _) => lines.push(format!(
                "Consensus: {} (confidence {:.4})",
                result.decision.as_str(),
                result.confidence
            )),
            (None, Some(n)) => lines.push(format!("Awaiting {n} more response(s)")),
            (None, None) => {}
        }
        lines.join("\n")
    }
}

pub async fn execute(args: RespondArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let outcome = engine.intake.respond(args.submission, args.validator, args.recommendation).await?;
    output(&RespondOutput::from(outcome), json_mode);
    Ok(())
}
