//! The async driver loop under paused tokio time.
mod common;

use std::time::Duration;

use chrono::Utc;
use common::{config_in, farm, seed_state, service_with, MockHost};
use farmreset::farm::Location;
use farmreset::service::{RunOutcome, ServiceCommand};
use farmreset::storage::ScheduleState;
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn manual_reset_runs_through_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    // just reset: the due-check stays quiet whatever the wall clock says
    seed_state(
        &dir,
        &ScheduleState {
            last_reset: Utc::now().timestamp(),
            ..ScheduleState::default()
        },
    );
    let mut host = MockHost::with_worlds(&["alpha"]);
    let player = host.join(Location::new("alpha", 0.0, 64.0, 0.0));
    let bystander = host.join(Location::new("world", 0.0, 64.0, 0.0));
    let mut service = service_with(config_in(&dir), host, &[farm("alpha", "alpha")]);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(ServiceCommand::StartManualReset {
        farm: "alpha".into(),
    })
    .unwrap();

    let driver = service.run(rx);
    let script = async {
        tokio::time::sleep(Duration::from_secs(31)).await;
        tx.send(ServiceCommand::Shutdown).unwrap();
    };
    let (outcome, ()) = tokio::join!(driver, script);
    assert_eq!(outcome.unwrap(), RunOutcome::Shutdown);

    let host = service.host();
    assert_eq!(host.created, vec!["alpha".to_string()]);
    assert_eq!(host.kicks.len(), 1);
    let counts: Vec<String> = host
        .messages_for(player)
        .into_iter()
        .filter(|m| m.chars().all(|c| c.is_ascii_digit()))
        .collect();
    assert_eq!(counts, ["30", "20", "10", "5", "4", "3"]);
    // progress was shown while running and hidden on shutdown
    assert!(host.hidden.contains(&bystander));
    assert!(!host.progress.contains_key(&bystander));
    assert!(service.manual_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn missed_automatic_reset_ends_the_loop_with_a_restart_request() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(
        &dir,
        &ScheduleState {
            last_reset: Utc::now().timestamp() - 31 * 86_400,
            ..ScheduleState::default()
        },
    );
    let host = MockHost::with_worlds(&["alpha"]);
    let mut service = service_with(config_in(&dir), host, &[farm("alpha", "alpha")]);

    let (_tx, rx) = mpsc::unbounded_channel();
    let outcome = service.run(rx).await.unwrap();

    assert_eq!(outcome, RunOutcome::RestartRequested);
    assert_eq!(service.host().restarts, 1);
    assert_eq!(service.host().created, vec!["alpha".to_string()]);
    assert!(service.pending_timers() <= 1);
}
