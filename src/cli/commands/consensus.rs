//! Consensus result CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{open_engine, parse_uuid};
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::domain::models::{Config, ConsensusDecision, ConsensusResult, Evaluation};
use crate::domain::ports::{ConsensusRepository, EvaluationRepository};

#[derive(Args, Debug)]
pub struct ConsensusArgs {
    #[command(subcommand)]
    pub command: ConsensusCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConsensusCommands {
    /// Show the result and evaluations for one submission
    Show {
        #[arg(value_parser = parse_uuid)]
        submission: Uuid,
        #[arg(long = "type")]
        submission_type: String,
    },
    /// List recent results
    List {
        /// Filter by decision: approved, rejected or escalated
        #[arg(long)]
        decision: Option<String>,
        #[arg(long, default_value = "50")]
        limit: i64,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ConsensusDetailOutput {
    pub submission_id: Uuid,
    pub result: Option<ConsensusResult>,
    pub evaluations: Vec<Evaluation>,
}

impl CommandOutput for ConsensusDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![match &self.result {
            Some(r) => format!(
                "Submission {}: {} (confidence {:.4}, {}/{} responses){}",
                r.submission_id,
                r.decision.as_str(),
                r.confidence,
                r.responses_received,
                r.quorum_size,
                r.escalation_reason.as_ref().map_or_else(String::new, |reason| format!(" [{reason}]"))
            ),
            None => format!("Submission {}: no consensus yet", self.submission_id),
        }];
        if self.evaluations.is_empty() {
            return lines.join("\n");
        }

        let mut t = table(&["VALIDATOR", "STATUS", "RECOMMENDATION", "EXPIRES"]);
        for e in &self.evaluations {
            t.add_row(vec![
                short_id(&e.validator_id.to_string()).to_string(),
                e.status.as_str().to_string(),
                e.recommendation.map_or("-", |r| r.as_str()).to_string(),
                e.expires_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        lines.push(t.to_string());
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ConsensusListOutput {
    pub results: Vec<ConsensusResult>,
    pub total: usize,
}

impl CommandOutput for ConsensusListOutput {
    fn to_human(&self) -> String {
        if self.results.is_empty() {
            return "No consensus results found.".to_string();
        }
        let mut t = table(&["SUBMISSION", "TYPE", "DECISION", "CONFIDENCE", "RESPONSES", "REASON", "DECIDED"]);
        for r in &self.results {
            t.add_row(vec![
                short_id(&r.submission_id.to_string()).to_string(),
                r.submission_type.clone(),
                r.decision.as_str().to_string(),
                format!("{:.4}", r.confidence),
                format!("{}/{}", r.responses_received, r.quorum_size),
                r.escalation_reason.clone().unwrap_or_default(),
                r.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        format!("{t}\n\nShowing {} result(s)", self.total)
    }
}

pub async fn execute(args: ConsensusArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;

    match args.command {
        ConsensusCommands::Show { submission, submission_type } => {
            let result = engine.consensus.get(submission, &submission_type).await?;
            let evaluations = engine
                .evaluations
                .list_for_submission(submission)
                .await?
                .into_iter()
                .filter(|e| e.submission_type == submission_type)
                .collect();
            let out = ConsensusDetailOutput { submission_id: submission, result, evaluations };
            output(&out, json_mode);
        }
        ConsensusCommands::List { decision, limit } => {
            let decision = decision
                .map(|d| ConsensusDecision::parse_str(&d).ok_or_else(|| anyhow::anyhow!("Invalid decision: {d}")))
                .transpose()?;
            let results = engine.consensus.list(decision, limit).await?;
            let out = ConsensusListOutput { total: results.len(), results };
            output(&out, json_mode);
        }
    }

    Ok(())
}
