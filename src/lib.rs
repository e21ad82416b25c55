//! # Farmreset - Scheduled and On-Demand Farm World Resets
//!
//! Farmreset retires a game server's "farm" worlds on a fixed cadence and
//! replaces them with freshly generated ones at a saved spawn point. Operators
//! and players can also trigger an immediate reset with a visible countdown.
//!
//! ## Features
//!
//! - **Fixed-timezone schedule**: reset every N days at a configured hour, the same for every player.
//! - **Safe teardown**: players are moved out before a world is unloaded, deleted and recreated.
//! - **Manual resets**: 30 second countdown with kick-before-delete, one session at a time.
//! - **Restart recovery**: spawn placement interrupted by a restart is finished on the next start.
//! - **Progress bar**: every player sees how long until the next reset.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use farmreset::config::Config;
//! use farmreset::host::DirectoryHost;
//! use farmreset::service::FarmResetService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let host = DirectoryHost::open(&config.host.worlds_dir, &config.host.default_world)?;
//!     let mut service = FarmResetService::new(config, host)?;
//!
//!     let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!     service.run(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - the service aggregate and its event loop
//! - [`reset`] - clock, timers, world-reset sequence, countdown, recovery and due-check
//! - [`farm`] - farm records, corner selection and the registry
//! - [`host`] - capability trait for the game server, plus a directory-backed host
//! - [`storage`] - JSON persistence of schedule state and farms
//! - [`config`] - TOML configuration and validation
//! - [`commands`] - `/farm` player commands
//! - [`progress`] - progress bar contents
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ FarmResetService│ ← timers + commands, one task
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   WorldHost     │ ← worlds and players
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Storage       │ ← state.json / farms.json
//! └─────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod farm;
pub mod host;
pub mod progress;
pub mod reset;
pub mod service;
pub mod storage;

pub use error::{FarmResetError, Result};
