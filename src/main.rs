//! Peerval CLI entry point.

use anyhow::Context;
use clap::Parser;

use peerval::cli::{commands, handle_error, Cli, Commands};
use peerval::infrastructure::config::ConfigLoader;
use peerval::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load().context("Failed to load configuration") {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, cli.json).await,
        Commands::Validator(args) => commands::validator::execute(args, &config, cli.json).await,
        Commands::Assign(args) => commands::assign::execute(args, &config, cli.json).await,
        Commands::Respond(args) => commands::respond::execute(args, &config, cli.json).await,
        Commands::GroundTruth(args) => commands::ground_truth::execute(args, &config, cli.json).await,
        Commands::Sweep(args) => commands::sweep::execute(args, &config, cli.json).await,
        Commands::Consensus(args) => commands::consensus::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
