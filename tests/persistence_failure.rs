//! The service keeps working when `state.json` cannot be read or written.
mod common;

use std::fs;

use common::{at, config_in, farm, seed_state, service_with, MockHost};
use farmreset::service::FarmResetService;
use farmreset::storage::{ScheduleState, Storage};

#[test]
fn corrupt_state_file_starts_on_a_fresh_schedule() {
    let dir = tempfile::tempdir().unwrap();
    Storage::new(dir.path())
        .unwrap()
        .save_farms(&farmreset::farm::FarmRegistry::from_records(vec![farm(
            "alpha", "alpha",
        )]))
        .unwrap();
    fs::write(dir.path().join("state.json"), "{not json").unwrap();

    let host = MockHost::with_worlds(&["alpha"]);
    let mut service = FarmResetService::new(config_in(&dir), host).unwrap();
    assert_eq!(service.state(), &ScheduleState::default());
    assert_eq!(service.farms().len(), 1);

    // bootstraps as on a first run and fires at today's reset hour
    assert!(service.check_and_reset(at(1, 8, 0, 0)).is_none());
    assert_ne!(service.state().last_reset, 0);
    let report = service.check_and_reset(at(1, 12, 0, 0)).expect("due");
    assert_eq!(report.reset, vec!["alpha".to_string()]);
}

#[test]
fn failing_state_save_does_not_stop_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(
        &dir,
        &ScheduleState {
            last_reset: at(1, 12, 0, 0).timestamp(),
            ..ScheduleState::default()
        },
    );
    let mut config = config_in(&dir);
    config.reset.reset_interval_days = 7;
    let host = MockHost::with_worlds(&["alpha", "beta"]);
    let mut service = service_with(config, host, &[farm("alpha", "alpha"), farm("beta", "beta")]);

    // a directory in place of the state file makes every save fail
    let state_path = dir.path().join("state.json");
    fs::remove_file(&state_path).unwrap();
    fs::create_dir(&state_path).unwrap();

    let now = at(8, 12, 0, 5);
    let report = service.check_and_reset(now).expect("reset should fire");
    assert_eq!(report.reset, vec!["alpha".to_string(), "beta".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(service.host().created.len(), 2);

    assert_eq!(service.state().last_reset, now.timestamp());
    assert_eq!(service.state().last_reset_today, now.timestamp());
    // the in-memory record still debounces the rest of the minute
    assert!(service.check_and_reset(at(8, 12, 0, 40)).is_none());
    assert!(state_path.is_dir());
}
