//! Operator command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::domain::errors::DomainError;

#[derive(Parser, Debug)]
#[command(name = "peerval")]
#[command(about = "Peer consensus validation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the project directory, config file and database
    Init(commands::init::InitArgs),
    /// Validator registry commands
    Validator(commands::validator::ValidatorArgs),
    /// Form (or top up) the quorum for a submission
    Assign(commands::assign::AssignArgs),
    /// Record a validator's recommendation
    Respond(commands::respond::RespondArgs),
    /// Record the moderation decision for a submission
    GroundTruth(commands::ground_truth::GroundTruthArgs),
    /// Expire overdue evaluations and escalate stalled quorums
    Sweep(commands::sweep::SweepArgs),
    /// Show consensus results
    Consensus(commands::consensus::ConsensusArgs),
}

/// Print an error and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = match err.downcast_ref::<DomainError>() {
        Some(DomainError::InsufficientValidators { .. }) => "insufficient_validators",
        Some(DomainError::ValidatorNotFound(_) | DomainError::EvaluationNotFound { .. }) => "not_found",
        Some(DomainError::InvalidStateTransition { .. }) => "invalid_state",
        Some(DomainError::ValidationFailed(_)) => "invalid_input",
        Some(DomainError::ConcurrencyConflict { .. }) => "conflict",
        Some(_) | None => "error",
    };

    if json_mode {
        let body = serde_json::json!({ "success": false, "code": code, "error": format!("{err:#}") });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
