//! Implementation of the `peerval sweep` command.

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use super::open_engine;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{StopReason, SweepDaemonEvent, SweepReport};

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Keep sweeping on the configured interval until interrupted
    #[arg(long)]
    pub daemon: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct SweepOutput {
    pub report: SweepReport,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        if self.report.is_empty() {
            return "Nothing to sweep.".to_string();
        }
        [
            format!("Expired evaluations on {} submission(s)", self.report.expired_submissions),
            format!("Escalated {} stalled quorum(s)", self.report.quorum_timeouts),
            format!("Aggregated {} complete quorum(s)", self.report.aggregated),
            format!("Reset {} daily counter(s)", self.report.daily_counters_reset),
        ]
        .join("\n")
    }
}

pub async fn execute(args: SweepArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;

    if !args.daemon {
        let report = engine.sweep.run_once().await?;
        output(&SweepOutput { report }, json_mode);
        return Ok(());
    }

    let daemon = engine.sweep_daemon();
    let handle = daemon.handle();
    let mut events = daemon.run();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SweepDaemonEvent::SweepCompleted { report, .. }) if !report.is_empty() => {
                    output(&SweepOutput { report }, json_mode);
                }
                Some(SweepDaemonEvent::Stopped { reason }) => {
                    if reason == StopReason::TooManyFailures {
                        anyhow::bail!("Sweep daemon stopped after repeated failures");
                    }
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping sweep daemon");
                handle.stop();
            }
        }
    }

    let status = handle.status().await;
    if status.failed_runs > 0 {
        warn!(failed_runs = status.failed_runs, "sweep daemon had failed runs");
    }
    info!(
        total_runs = status.total_runs,
        quorum_timeouts = status.total_quorum_timeouts,
        aggregated = status.total_aggregated,
        "sweep daemon exited"
    );
    Ok(())
}
