//! Capability interface to the game server that owns worlds and players.
//!
//! The reset logic never keeps a world handle around: every call names the
//! world it acts on, so a world can be destroyed and recreated underneath the
//! service without anything dangling. All calls are made from the single
//! service task, one at a time.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::farm::Location;
use crate::progress::ProgressView;

pub mod directory;

pub use directory::DirectoryHost;

/// Stable identifier of a connected player.
pub type PlayerId = Uuid;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("world not loaded: {0}")]
    WorldNotLoaded(String),

    #[error("player {0} is not online")]
    PlayerOffline(PlayerId),

    #[error("world creation failed for '{world}': {reason}")]
    CreateFailed { world: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// World and player operations the reset service needs from the server.
pub trait WorldHost {
    /// Whether a world with this name is currently loaded.
    fn is_world_loaded(&self, world: &str) -> bool;

    /// The server's first-loaded world, used as the evacuation target.
    fn default_world(&self) -> Option<String>;

    fn online_players(&self) -> Vec<PlayerId>;

    fn players_in_world(&self, world: &str) -> Vec<PlayerId>;

    fn player_location(&self, player: PlayerId) -> Option<Location>;

    fn send_message(&mut self, player: PlayerId, message: &str);

    /// Move a player to the spawn point of `world`.
    fn teleport_to_spawn(&mut self, player: PlayerId, world: &str) -> Result<(), HostError>;

    /// Disconnect a player with a reason shown on their screen.
    fn kick(&mut self, player: PlayerId, reason: &str);

    fn unload_world(&mut self, world: &str, save: bool) -> Result<(), HostError>;

    /// On-disk directory of a world, if the host knows it.
    fn world_folder(&self, world: &str) -> Option<PathBuf>;

    /// Generate and load a new world under `world`.
    fn create_world(&mut self, world: &str) -> Result<(), HostError>;

    /// Y coordinate of the highest solid block at a column, if the world has terrain there.
    fn highest_block_y(&self, world: &str, x: f64, z: f64) -> Option<f64>;

    fn set_spawn(&mut self, world: &str, spawn: &Location) -> Result<(), HostError>;

    fn show_progress(&mut self, player: PlayerId, view: &ProgressView);

    fn hide_progress(&mut self, player: PlayerId);

    /// Ask the server process to restart once the current work is finished.
    fn request_restart(&mut self);
}
