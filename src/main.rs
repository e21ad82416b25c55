//! Binary entrypoint for the farmreset CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `start` - run the reset service until Ctrl+C or a restart request
//! - `status` - next reset, progress and pending spawn placements
//! - `farms` - list registered farms
//! - `create --name <n> --world <w> --pos1 x,y,z --pos2 x,y,z` - register a farm
//! - `reset <farm>` - manual reset with the 30 second countdown
//!
//! `start` exits with code 75 after an automatic reset so a supervisor can
//! relaunch the game server.
//!
//! See the library crate docs for module-level details: `farmreset::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use farmreset::config::Config;
use farmreset::farm::{create_farm, Location};
use farmreset::host::{DirectoryHost, WorldHost};
use farmreset::progress;
use farmreset::service::{FarmResetService, RunOutcome};

/// Exit status asking the supervisor to restart the server (EX_TEMPFAIL).
const EXIT_RESTART: i32 = 75;

#[derive(Parser)]
#[command(name = "farmreset")]
#[command(about = "Scheduled and on-demand farm world resets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Run the reset service
    Start,
    /// Show the schedule and pending work
    Status,
    /// List registered farms
    Farms,
    /// Register a farm from two corners
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        world: String,
        /// First corner as x,y,z
        #[arg(long, value_parser = parse_point)]
        pos1: (f64, f64, f64),
        /// Second corner as x,y,z
        #[arg(long, value_parser = parse_point)]
        pos2: (f64, f64, f64),
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        yaw: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pitch: f32,
    },
    /// Reset one farm now (30 second countdown)
    Reset {
        /// Farm name
        farm: String,
    },
}

fn parse_point(s: &str) -> std::result::Result<(f64, f64, f64), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got '{}'", s));
    }
    let mut coords = [0.0f64; 3];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok((coords[0], coords[1], coords[2]))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        info!("Initializing new farmreset configuration");
        Config::create_default(&cli.config).await?;
        let config = Config::load(&cli.config).await?;
        std::fs::create_dir_all(&config.storage.data_dir)
            .with_context(|| format!("creating data dir {}", config.storage.data_dir))?;
        std::fs::create_dir_all(&config.host.worlds_dir)
            .with_context(|| format!("creating worlds dir {}", config.host.worlds_dir))?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    let host = DirectoryHost::open(&config.host.worlds_dir, &config.host.default_world)
        .with_context(|| format!("opening worlds dir {}", config.host.worlds_dir))?;
    let mut service = FarmResetService::new(config, host)?;

    match cli.command {
        Commands::Init => {}
        Commands::Start => {
            info!("Starting farmreset v{}", env!("CARGO_PKG_VERSION"));
            let (_commands, rx) = tokio::sync::mpsc::unbounded_channel();
            let outcome = service.run(rx).await?;
            if outcome == RunOutcome::RestartRequested {
                info!("Automatic reset finished; exiting for restart");
                std::process::exit(EXIT_RESTART);
            }
        }
        Commands::Status => {
            let now = service.local_now();
            let reset = &service.config().reset;
            let view = progress::render(
                now,
                service.state().last_reset,
                reset.reset_hour,
                reset.reset_interval_days,
            );
            println!("farmreset status");
            println!("  Next reset: {}", service.next_reset(now).format("%d.%m.%Y %H:%M %Z"));
            println!("  {}", view.title);
            println!("  Progress: {:.1}%", view.progress * 100.0);
            println!("  Farms: {}", service.farms().len());
            let pending = service.pending_spawn_fixes();
            if pending.is_empty() {
                println!("  Pending spawn placement: none");
            } else {
                println!("  Pending spawn placement: {}", pending.join(", "));
            }
        }
        Commands::Farms => {
            if service.farms().is_empty() {
                println!("No farms registered.");
            }
            for farm in service.farms().all() {
                let loaded = if service.host().is_world_loaded(farm.world()) {
                    "loaded"
                } else {
                    "missing"
                };
                println!(
                    "{} [{} - {}] spawn {}",
                    farm.name,
                    farm.world(),
                    loaded,
                    farm.spawn.describe()
                );
            }
        }
        Commands::Create {
            name,
            world,
            pos1,
            pos2,
            yaw,
            pitch,
        } => {
            let p1 = Location::new(world.clone(), pos1.0, pos1.1, pos1.2);
            let p2 = Location::new(world.clone(), pos2.0, pos2.1, pos2.2);
            let farm = create_farm(&name, Some(&p1), Some(&p2), (yaw, pitch))?;
            if !service.host().is_world_loaded(&world) {
                warn!("World '{}' does not exist yet; it will be created on first reset", world);
            }
            let spawn = farm.spawn.describe();
            service.register_farm(farm)?;
            println!("Farm '{}' created, spawn {}", name, spawn);
        }
        Commands::Reset { farm } => {
            println!("Resetting farm '{}' in 30 seconds...", farm);
            service.run_manual_reset(&farm).await?;
            if service.pending_spawn_fixes().iter().any(|f| f == &farm) {
                println!("Farm '{}' reset; spawn placement is pending.", farm);
            } else {
                println!("Farm '{}' reset.", farm);
            }
        }
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Under a supervisor stdout is redirected; only echo to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
