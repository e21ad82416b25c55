//! Test utilities & fixtures.
//! A recording in-memory host plus helpers for building a service on a temp dir.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use farmreset::config::Config;
use farmreset::farm::{create_farm, FarmRecord, Location};
use farmreset::host::{HostError, PlayerId, WorldHost};
use farmreset::progress::ProgressView;
use farmreset::service::FarmResetService;
use farmreset::storage::{ScheduleState, Storage};
use uuid::Uuid;

/// In-memory host that records every call the service makes.
#[derive(Default)]
pub struct MockHost {
    pub loaded: BTreeSet<String>,
    pub default_world: String,
    /// Online players and where they stand.
    pub players: HashMap<PlayerId, Location>,
    pub messages: Vec<(PlayerId, String)>,
    pub teleports: Vec<(PlayerId, String)>,
    pub kicks: Vec<(PlayerId, String)>,
    pub unloads: Vec<(String, bool)>,
    pub created: Vec<String>,
    pub spawns: Vec<(String, Location)>,
    pub fail_create: HashSet<String>,
    pub folders: HashMap<String, PathBuf>,
    pub surface_y: Option<f64>,
    pub progress: HashMap<PlayerId, ProgressView>,
    pub hidden: Vec<PlayerId>,
    pub restarts: usize,
    /// Ordered trace of world-level operations, e.g. `unload alpha`.
    pub events: Vec<String>,
}

impl MockHost {
    pub fn with_worlds(worlds: &[&str]) -> Self {
        let mut host = MockHost {
            default_world: "world".to_string(),
            ..MockHost::default()
        };
        host.loaded.insert("world".to_string());
        for w in worlds {
            host.loaded.insert(w.to_string());
        }
        host
    }

    /// Put a new online player at `location` and return their id.
    pub fn join(&mut self, location: Location) -> PlayerId {
        let id = Uuid::new_v4();
        self.players.insert(id, location);
        id
    }

    pub fn messages_for(&self, player: PlayerId) -> Vec<String> {
        self.messages
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl WorldHost for MockHost {
    fn is_world_loaded(&self, world: &str) -> bool {
        self.loaded.contains(world)
    }

    fn default_world(&self) -> Option<String> {
        self.loaded
            .contains(&self.default_world)
            .then(|| self.default_world.clone())
    }

    fn online_players(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    fn players_in_world(&self, world: &str) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self
            .players
            .iter()
            .filter(|(_, loc)| loc.world == world)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn player_location(&self, player: PlayerId) -> Option<Location> {
        self.players.get(&player).cloned()
    }

    fn send_message(&mut self, player: PlayerId, message: &str) {
        if self.players.contains_key(&player) {
            self.messages.push((player, message.to_string()));
        }
    }

    fn teleport_to_spawn(&mut self, player: PlayerId, world: &str) -> Result<(), HostError> {
        let Some(loc) = self.players.get_mut(&player) else {
            return Err(HostError::PlayerOffline(player));
        };
        *loc = Location::new(world, 0.0, 64.0, 0.0);
        self.teleports.push((player, world.to_string()));
        self.events.push(format!("teleport {}", world));
        Ok(())
    }

    fn kick(&mut self, player: PlayerId, reason: &str) {
        self.players.remove(&player);
        self.kicks.push((player, reason.to_string()));
        self.events.push("kick".to_string());
    }

    fn unload_world(&mut self, world: &str, save: bool) -> Result<(), HostError> {
        if !self.loaded.remove(world) {
            return Err(HostError::WorldNotLoaded(world.to_string()));
        }
        self.unloads.push((world.to_string(), save));
        self.events.push(format!("unload {}", world));
        Ok(())
    }

    fn world_folder(&self, world: &str) -> Option<PathBuf> {
        self.folders.get(world).cloned()
    }

    fn create_world(&mut self, world: &str) -> Result<(), HostError> {
        if self.fail_create.contains(world) {
            self.events.push(format!("create-failed {}", world));
            return Err(HostError::CreateFailed {
                world: world.to_string(),
                reason: "generator crashed".to_string(),
            });
        }
        self.loaded.insert(world.to_string());
        self.created.push(world.to_string());
        self.events.push(format!("create {}", world));
        Ok(())
    }

    fn highest_block_y(&self, _world: &str, _x: f64, _z: f64) -> Option<f64> {
        self.surface_y
    }

    fn set_spawn(&mut self, world: &str, spawn: &Location) -> Result<(), HostError> {
        if !self.loaded.contains(world) {
            return Err(HostError::WorldNotLoaded(world.to_string()));
        }
        self.spawns.push((world.to_string(), spawn.clone()));
        self.events.push(format!("spawn {}", world));
        Ok(())
    }

    fn show_progress(&mut self, player: PlayerId, view: &ProgressView) {
        self.progress.insert(player, view.clone());
    }

    fn hide_progress(&mut self, player: PlayerId) {
        self.progress.remove(&player);
        self.hidden.push(player);
    }

    fn request_restart(&mut self) {
        self.restarts += 1;
    }
}

/// Local time in the default schedule zone.
pub fn berlin(month: u32, day: u32, h: u32, m: u32, s: u32) -> DateTime<Tz> {
    chrono_tz::Europe::Berlin
        .with_ymd_and_hms(2024, month, day, h, m, s)
        .unwrap()
}

/// 2024-03-`day` `h:m:s` Berlin time (still CET before the 31st).
pub fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Tz> {
    berlin(3, day, h, m, s)
}

pub fn config_in(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_string_lossy().into_owned();
    config
}

/// Farm `name` in world `world` with corners around the origin.
pub fn farm(name: &str, world: &str) -> FarmRecord {
    let p1 = Location::new(world, -10.0, 60.0, -10.0);
    let p2 = Location::new(world, 10.0, 80.0, 10.0);
    create_farm(name, Some(&p1), Some(&p2), (90.0, 0.0)).unwrap()
}

/// Write `state` to the data dir before a service opens it.
pub fn seed_state(dir: &tempfile::TempDir, state: &ScheduleState) {
    Storage::new(dir.path()).unwrap().save_state(state).unwrap();
}

pub fn read_state(dir: &tempfile::TempDir) -> ScheduleState {
    Storage::new(dir.path()).unwrap().load_state().unwrap()
}

/// Service over `host` with the given farms registered.
pub fn service_with(
    config: Config,
    host: MockHost,
    farms: &[FarmRecord],
) -> FarmResetService<MockHost> {
    let mut service = FarmResetService::new(config, host).unwrap();
    for f in farms {
        service.register_farm(f.clone()).unwrap();
    }
    service
}
