mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;
use uuid::Uuid;

use peerval::domain::models::ValidatorTier;
use peerval::domain::ports::ConsensusRepository;
use peerval::services::{StopReason, SweepDaemon, SweepDaemonConfig, SweepDaemonEvent};

use common::{global_request, memory_engine};

#[tokio::test]
async fn test_daemon_escalates_on_startup_and_stops_on_request() {
    let t = memory_engine().await;
    t.seed_many(3, ValidatorTier::Journeyman, None).await;
    let request = global_request(Uuid::new_v4());
    t.engine.assignment.assign(&request).await.unwrap();
    t.clock.advance(Duration::hours(25));

    let daemon = SweepDaemon::new(
        t.engine.sweep.clone(),
        SweepDaemonConfig {
            sweep_interval: StdDuration::from_millis(20),
            run_on_startup: true,
            max_consecutive_failures: 3,
        },
    );
    let handle = daemon.handle();
    let mut events = daemon.run();

    let mut escalated = 0;
    let reason = tokio::time::timeout(StdDuration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            match event {
                SweepDaemonEvent::SweepCompleted { report, .. } => {
                    escalated += report.quorum_timeouts;
                    handle.stop();
                }
                SweepDaemonEvent::Stopped { reason } => return Some(reason),
                _ => {}
            }
        }
        None
    })
    .await
    .expect("daemon should stop within the timeout");

    assert_eq!(reason, Some(StopReason::Requested));
    assert_eq!(escalated, 1);
    assert!(t.engine.consensus.get(request.submission_id, "post").await.unwrap().is_some());

    let status = handle.status().await;
    assert!(!status.running);
    assert_eq!(status.total_quorum_timeouts, 1);
    assert_eq!(status.failed_runs, 0);
}

#[tokio::test]
async fn test_engine_daemon_uses_configured_interval() {
    let t = memory_engine().await;
    let daemon = t.engine.sweep_daemon();
    assert_eq!(daemon.config().sweep_interval, StdDuration::from_secs(60));
    assert!(daemon.config().run_on_startup);
    assert!(daemon.run_once().await.unwrap().is_empty());
}
