//! Validator registry CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{open_engine, parse_uuid};
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::domain::models::{Config, GeoPoint, TierChange, Validator, ValidatorTier};
use crate::domain::ports::ValidatorFilter;
use crate::services::Registration;

#[derive(Args, Debug)]
pub struct ValidatorArgs {
    #[command(subcommand)]
    pub command: ValidatorCommands,
}

#[derive(Subcommand, Debug)]
pub enum ValidatorCommands {
    /// Register a new apprentice validator
    Register {
        /// Owning agent
        #[arg(long, value_parser = parse_uuid)]
        agent: Uuid,
        /// Home latitude (requires --lng)
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Home longitude (requires --lat)
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Region the validator knows well (repeatable)
        #[arg(long = "region")]
        regions: Vec<String>,
        /// Content domain the validator knows well (repeatable)
        #[arg(long = "domain")]
        domains: Vec<String>,
    },
    /// List validators
    List {
        /// Filter by tier
        #[arg(long)]
        tier: Option<String>,
        /// Include deactivated validators
        #[arg(long)]
        all: bool,
    },
    /// Show a validator and its tier history
    Show {
        #[arg(value_parser = parse_uuid)]
        id: Uuid,
    },
    /// Remove a validator from future quorums
    Deactivate {
        #[arg(value_parser = parse_uuid)]
        id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct ValidatorOutput {
    pub validator: Validator,
}

impl From<Validator> for ValidatorOutput {
    fn from(validator: Validator) -> Self {
        Self { validator }
    }
}

impl CommandOutput for ValidatorOutput {
    fn to_human(&self) -> String {
        let v = &self.validator;
        let home = v
            .home_point
            .map_or_else(|| "global".to_string(), |p| format!("{:.4}, {:.4}", p.lat, p.lng));
        let mut lines = vec![
            format!("Validator: {}", v.id),
            format!("Agent:     {}", v.agent_id),
            format!("Tier:      {}", v.tier.as_str()),
            format!("Active:    {}", v.is_active),
            format!("Home:      {home}"),
            format!(
                "Accuracy:  precision {:.4}, recall {:.4}, f1 {:.4}",
                v.precision, v.recall, v.f1_score
            ),
            format!("Scored:    {} ({} exact)", v.total_evaluations, v.correct_evaluations),
            format!("Today:     {}", v.daily_evaluation_count),
        ];
        if !v.regions.is_empty() {
            lines.push(format!("Regions:   {}", v.regions.join(", ")));
        }
        if !v.domains.is_empty() {
            lines.push(format!("Domains:   {}", v.domains.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ValidatorListOutput {
    pub validators: Vec<ValidatorOutput>,
    pub total: usize,
}

impl CommandOutput for ValidatorListOutput {
    fn to_human(&self) -> String {
        if self.validators.is_empty() {
            return "No validators found.".to_string();
        }
        let mut t = table(&["ID", "AGENT", "TIER", "F1", "SCORED", "TODAY", "SCOPE", "ACTIVE"]);
        for out in &self.validators {
            let v = &out.validator;
            t.add_row(vec![
                short_id(&v.id.to_string()).to_string(),
                short_id(&v.agent_id.to_string()).to_string(),
                v.tier.as_str().to_string(),
                format!("{:.4}", v.f1_score),
                v.total_evaluations.to_string(),
                v.daily_evaluation_count.to_string(),
                if v.is_global() { "global" } else { "local" }.to_string(),
                v.is_active.to_string(),
            ]);
        }
        format!("{t}\n\nShowing {} validator(s)", self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ValidatorDetailOutput {
    pub validator: ValidatorOutput,
    pub tier_history: Vec<TierChange>,
}

impl CommandOutput for ValidatorDetailOutput {
    fn to_human(&self) -> String {
        let mut out = self.validator.to_human();
        if self.tier_history.is_empty() {
            out.push_str("\n\nNo tier changes.");
            return out;
        }
        let mut t = table(&["CHANGED AT", "FROM", "TO", "F1", "SCORED"]);
        for change in &self.tier_history {
            t.add_row(vec![
                change.changed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                change.from_tier.as_str().to_string(),
                change.to_tier.as_str().to_string(),
                format!("{:.4}", change.f1_score_at_change),
                change.total_evaluations_at_change.to_string(),
            ]);
        }
        format!("{out}\n\nTier history:\n{t}")
    }
}

pub async fn execute(args: ValidatorArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;

    match args.command {
        ValidatorCommands::Register { agent, lat, lng, regions, domains } => {
            let home_point = lat.zip(lng).map(|(lat, lng)| GeoPoint::new(lat, lng));
            let validator = engine
                .registry
                .register(Registration { agent_id: agent, home_point, regions, domains })
                .await?;
            output(&ValidatorOutput::from(validator), json_mode);
        }
        ValidatorCommands::List { tier, all } => {
            let tier = tier
                .map(|t| ValidatorTier::parse_str(&t).ok_or_else(|| anyhow::anyhow!("Invalid tier: {t}")))
                .transpose()?;
            let validators = engine
                .registry
                .list(ValidatorFilter { tier, agent_id: None, active_only: !all })
                .await?;
            let out = ValidatorListOutput {
                total: validators.len(),
                validators: validators.into_iter().map(ValidatorOutput::from).collect(),
            };
            output(&out, json_mode);
        }
        ValidatorCommands::Show { id } => {
            let validator = engine.registry.get(id).await?;
            let tier_history = engine.registry.tier_history(id).await?;
            let out = ValidatorDetailOutput { validator: validator.into(), tier_history };
            output(&out, json_mode);
        }
        ValidatorCommands::Deactivate { id } => {
            let validator = engine.registry.deactivate(id).await?;
            output(&ValidatorOutput::from(validator), json_mode);
        }
    }

    Ok(())
}
