//! `/farm` text commands issued by players.
//!
//! Parsing is separate from execution so the host can decide what counts as
//! a farm command. Handlers return the reply lines; the service delivers
//! them to the player.

use chrono::DateTime;
use chrono_tz::Tz;
use log::{error, info};

use crate::error::FarmResetError;
use crate::farm::create_farm;
use crate::host::{PlayerId, WorldHost};
use crate::reset::countdown::COUNTDOWN_SECONDS;
use crate::service::FarmResetService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarmCommand {
    Pos1,
    Pos2,
    /// Name may be empty; the handler answers with usage then.
    Create(String),
    Reset,
    Info,
    Help,
}

/// Parse a chat line such as `/farm create mine`.
///
/// Returns `None` for lines that are not farm commands. Unknown or missing
/// subcommands map to [`FarmCommand::Help`].
pub fn parse(line: &str) -> Option<FarmCommand> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    let head = head.strip_prefix('/').unwrap_or(head);
    if !head.eq_ignore_ascii_case("farm") {
        return None;
    }

    let sub = parts.next().map(|s| s.to_ascii_lowercase());
    let cmd = match sub.as_deref() {
        Some("pos1") => FarmCommand::Pos1,
        Some("pos2") => FarmCommand::Pos2,
        Some("create") => FarmCommand::Create(parts.next().unwrap_or_default().to_string()),
        Some("reset") => FarmCommand::Reset,
        Some("info") => FarmCommand::Info,
        _ => FarmCommand::Help,
    };
    Some(cmd)
}

pub fn help_lines() -> Vec<String> {
    vec![
        "=== FarmReset Help ===".to_string(),
        "/farm pos1 - Set position 1".to_string(),
        "/farm pos2 - Set position 2".to_string(),
        "/farm create <name> - Create a farm from both positions".to_string(),
        format!(
            "/farm reset - Reset the farm world you are in ({} second countdown)",
            COUNTDOWN_SECONDS
        ),
        "/farm info - Show farm information".to_string(),
    ]
}

impl<H: WorldHost> FarmResetService<H> {
    /// Execute a farm command for `player` and return the reply lines.
    pub fn handle_farm_command(
        &mut self,
        player: PlayerId,
        cmd: FarmCommand,
        now: DateTime<Tz>,
    ) -> Vec<String> {
        match cmd {
            FarmCommand::Pos1 => self.select_corner(player, 1),
            FarmCommand::Pos2 => self.select_corner(player, 2),
            FarmCommand::Create(name) => self.create_from_corners(player, &name),
            FarmCommand::Reset => self.reset_current_world(player, now),
            FarmCommand::Info => self.farm_info_lines(),
            FarmCommand::Help => help_lines(),
        }
    }

    fn select_corner(&mut self, player: PlayerId, corner: u8) -> Vec<String> {
        let Some(location) = self.host.player_location(player) else {
            return vec!["You need to be in a world to set a position.".to_string()];
        };
        let reply = format!("Position {} set: {}", corner, location.describe());
        if corner == 1 {
            self.corners.set_pos1(player, location);
        } else {
            self.corners.set_pos2(player, location);
        }
        vec![reply]
    }

    fn create_from_corners(&mut self, player: PlayerId, name: &str) -> Vec<String> {
        if name.is_empty() {
            return vec!["Usage: /farm create <name>".to_string()];
        }
        let facing = self
            .host
            .player_location(player)
            .map(|l| (l.yaw, l.pitch))
            .unwrap_or((0.0, 0.0));

        let farm = match create_farm(
            name,
            self.corners.pos1(&player),
            self.corners.pos2(&player),
            facing,
        ) {
            Ok(farm) => farm,
            Err(FarmResetError::MissingCorner(_)) => {
                return vec!["Please set position 1 and position 2 first!".to_string()]
            }
            Err(e) => return vec![format!("Could not create farm: {}", e)],
        };

        let spawn = farm.spawn.describe();
        info!("Player {} created farm '{}'", player, name);
        let mut reply = vec![
            format!("Farm '{}' created!", name),
            format!("Spawn position: {}", spawn),
        ];
        if let Err(e) = self.register_farm(farm) {
            error!("Could not save farm '{}': {}", name, e);
            reply.push("Warning: the farm could not be saved and will be lost on restart.".to_string());
        }
        reply
    }

    fn reset_current_world(&mut self, player: PlayerId, now: DateTime<Tz>) -> Vec<String> {
        let Some(location) = self.host.player_location(player) else {
            return vec!["You need to be in a world to reset it.".to_string()];
        };
        let Some(farm) = self.farms.find_by_world(&location.world) else {
            return vec!["No farm found in this world!".to_string()];
        };
        let name = farm.name.clone();
        match self.start_manual_reset(&name, now) {
            Ok(()) => vec![format!(
                "Farm reset started! The world will be reset in {} seconds.",
                COUNTDOWN_SECONDS
            )],
            Err(FarmResetError::AlreadyInProgress(_)) => {
                vec!["A farm reset is already running!".to_string()]
            }
            Err(e) => vec![format!("Could not start reset: {}", e)],
        }
    }

    fn farm_info_lines(&self) -> Vec<String> {
        if self.farms.is_empty() {
            return vec!["No farms found!".to_string()];
        }
        let mut lines = vec!["=== Farm information ===".to_string()];
        for farm in self.farms.all() {
            lines.push(format!("{}:", farm.name));
            lines.push(format!("  Spawn: {}", farm.spawn.describe()));
            lines.push(format!("  World: {}", farm.world()));
        }
        lines
    }
}
