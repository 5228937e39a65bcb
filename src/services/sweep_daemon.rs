//! Background daemon that runs the escalation sweep on an interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant};
use tracing::{error, info};

use super::escalation_sweep::{EscalationSweep, SweepReport};
use crate::domain::errors::DomainResult;
use crate::domain::models::SweepConfig;
use crate::domain::ports::{
    ConsensusRepository, EvaluationRepository, GroundTruthRepository, ValidatorRepository,
};

#[derive(Debug, Clone)]
pub struct SweepDaemonConfig {
    pub sweep_interval: Duration,
    pub run_on_startup: bool,
    /// Consecutive failed sweeps tolerated before the daemon stops.
    pub max_consecutive_failures: u32,
}

impl Default for SweepDaemonConfig {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

impl From<&SweepConfig> for SweepDaemonConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.interval_secs.max(1)),
            run_on_startup: config.run_on_startup,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SweepDaemonEvent {
    Started,
    SweepStarted { run_number: u64 },
    SweepCompleted { run_number: u64, report: SweepReport, duration_ms: u64 },
    SweepFailed { run_number: u64, error: String },
    Stopped { reason: StopReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
    pub total_expired_submissions: u64,
    pub total_quorum_timeouts: u64,
    pub total_aggregated: u64,
}

/// Handle to control a running sweep daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct SweepDaemon<V, E, C, G>
where
    V: ValidatorRepository + 'static,
    E: EvaluationRepository + 'static,
    C: ConsensusRepository + 'static,
    G: GroundTruthRepository + 'static,
{
    sweep: Arc<EscalationSweep<V, E, C, G>>,
    config: SweepDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl<V, E, C, G> SweepDaemon<V, E, C, G>
where
    V: ValidatorRepository + 'static,
    E: EvaluationRepository + 'static,
    C: ConsensusRepository + 'static,
    G: GroundTruthRepository + 'static,
{
    pub fn new(sweep: Arc<EscalationSweep<V, E, C, G>>, config: SweepDaemonConfig) -> Self {
        Self {
            sweep,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon loop, returning a channel of its events.
    pub fn run(self) -> mpsc::Receiver<SweepDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<SweepDaemonEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(SweepDaemonEvent::Started).await;
        info!(interval_secs = self.config.sweep_interval.as_secs(), "sweep daemon started");

        let mut consecutive_failures = 0u32;
        let mut timer = interval(self.config.sweep_interval);
        // The first tick completes immediately.
        timer.tick().await;

        if self.config.run_on_startup {
            self.run_cycle(&tx, &mut consecutive_failures).await;
        }

        let reason = loop {
            if consecutive_failures >= self.config.max_consecutive_failures {
                break StopReason::TooManyFailures;
            }
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }

            timer.tick().await;
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }
            self.run_cycle(&tx, &mut consecutive_failures).await;
        };

        self.status.write().await.running = false;
        match reason {
            StopReason::TooManyFailures => error!(consecutive_failures, "sweep daemon stopping after repeated failures"),
            StopReason::Requested => info!("sweep daemon stopped"),
        }
        let _ = tx.send(SweepDaemonEvent::Stopped { reason }).await;
    }

    async fn run_cycle(&self, tx: &mpsc::Sender<SweepDaemonEvent>, consecutive_failures: &mut u32) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };
        let _ = tx.send(SweepDaemonEvent::SweepStarted { run_number }).await;

        let start = Instant::now();
        let result = self.sweep.run_once().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(report) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                    status.last_run = Some(Instant::now());
                    status.total_expired_submissions += report.expired_submissions as u64;
                    status.total_quorum_timeouts += report.quorum_timeouts as u64;
                    status.total_aggregated += report.aggregated as u64;
                }
                let _ = tx.send(SweepDaemonEvent::SweepCompleted { run_number, report, duration_ms }).await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                self.status.write().await.failed_runs += 1;
                error!(run_number, error = %e, "sweep failed");
                let _ = tx.send(SweepDaemonEvent::SweepFailed { run_number, error: e.to_string() }).await;
            }
        }
    }

    /// Run a single sweep outside the loop.
    pub async fn run_once(&self) -> DomainResult<SweepReport> {
        self.sweep.run_once().await
    }

    pub fn config(&self) -> &SweepDaemonConfig {
        &self.config
    }
}
