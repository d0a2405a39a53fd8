//! retrobridge - headless emulation host
//!
//! Boots a game on one of the built-in engines, runs it in real time for a
//! number of frames while draining audio like an output device would, then
//! prints session statistics as JSON.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rb_audio::AudioConsumer;
use rb_core::{Config, Sample};
use rb_integration::{Bridge, EngineRegistry, FirmwareSet, GameAsset};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "retrobridge", version, about = "Headless emulation host")]
struct Cli {
    /// Configuration file (defaults to the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a game for a number of frames and print session statistics
    Run(RunArgs),
    /// List the available systems
    List,
}

#[derive(Args)]
struct RunArgs {
    /// System to emulate (see `list`)
    #[arg(long, short)]
    system: String,

    /// Path to the game image
    #[arg(long, short)]
    game: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Firmware asset as KEY=PATH; may be repeated
    #[arg(long = "firmware", value_name = "KEY=PATH")]
    firmware: Vec<String>,

    /// Cheat as FAMILY:CODE; may be repeated
    #[arg(long = "cheat", value_name = "FAMILY:CODE")]
    cheats: Vec<String>,

    /// Battery save file, read on load and written on exit
    #[arg(long)]
    battery: Option<PathBuf>,

    /// Restore this save state before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a save state here after running
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Emulation rate (1.0 is native speed)
    #[arg(long, default_value_t = 1.0)]
    rate: f64,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(Config::from_toml_str(&text)?)
        }
        None => Ok(Config::load()?),
    }
}

fn load_firmware(entries: &[String]) -> anyhow::Result<FirmwareSet> {
    let mut firmware = FirmwareSet::new();
    for entry in entries {
        let Some((key, path)) = entry.split_once('=') else {
            bail!("firmware must be KEY=PATH, got '{}'", entry);
        };
        firmware
            .load_file(key, path)
            .with_context(|| format!("loading firmware '{}'", key))?;
    }
    Ok(firmware)
}

/// Pull audio at the device rate until told to stop
fn spawn_audio_sink(
    mut consumer: AudioConsumer,
    samples_per_sec: usize,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let period = Duration::from_millis(10);
    let mut buffer: Vec<Sample> = vec![0; (samples_per_sec / 100).max(1)];
    let handle = thread::Builder::new()
        .name("rb-audio-sink".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                consumer.fill(&mut buffer);
                thread::sleep(period);
            }
        })?;
    Ok(handle)
}

fn list_systems(registry: &EngineRegistry) {
    for system in registry.systems() {
        if let Some(desc) = registry.descriptor(system.as_str()) {
            let families: Vec<&str> = desc.cheat_families.iter().map(|f| f.tag()).collect();
            println!(
                "{:<8} {:<32} {:>8.4} fps  cheats: {}",
                system.as_str(),
                desc.name,
                desc.frame_rate,
                families.join(", ")
            );
        }
    }
}

fn run(registry: &EngineRegistry, config: Config, args: RunArgs) -> anyhow::Result<()> {
    let mut game = GameAsset::from_file(&args.game)
        .with_context(|| format!("reading {}", args.game.display()))?;
    if let Some(battery) = &args.battery {
        game = game.with_battery_save(battery);
    }
    let firmware = load_firmware(&args.firmware)?;

    let mut bridge = Bridge::new(registry.instantiate(&args.system)?, config);
    bridge.set_rate(args.rate)?;
    bridge.load(game, &firmware)?;

    if let Some(path) = &args.load_state {
        bridge.load_state(path)?;
    }
    for entry in &args.cheats {
        let Some((family, code)) = entry.split_once(':') else {
            bail!("cheat must be FAMILY:CODE, got '{}'", entry);
        };
        let handle = bridge.add_cheat(family, code)?;
        tracing::info!("Cheat {} active: {}", handle, code);
    }

    let stop_audio = Arc::new(AtomicBool::new(false));
    let audio_sink = match bridge.take_audio_consumer() {
        Some(consumer) => {
            let format = bridge.audio_format();
            let samples = format.sample_rate as usize * format.channels as usize;
            Some(spawn_audio_sink(consumer, samples, Arc::clone(&stop_audio))?)
        }
        None => None,
    };

    let started = Instant::now();
    bridge.start()?;
    while bridge.is_running() && bridge.stats().frames_advanced < args.frames {
        thread::sleep(Duration::from_millis(5));
    }
    match bridge.last_fault() {
        Some(fault) => tracing::error!("Session ended by engine fault: {}", fault),
        None => {
            bridge.pause()?;
            if let Some(path) = &args.save_state {
                bridge.save_state(path)?;
            }
        }
    }
    let stats = bridge.stats();
    bridge.stop()?;

    stop_audio.store(true, Ordering::Relaxed);
    if let Some(handle) = audio_sink {
        let _ = handle.join();
    }

    tracing::info!(
        "Ran {} frames in {:.2}s",
        stats.frames_advanced,
        started.elapsed().as_secs_f64()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    rb_core::logging::init(config.debug.log_level);
    tracing::info!("Starting retrobridge");

    let registry = EngineRegistry::with_null_engines();
    match cli.command {
        Command::List => {
            list_systems(&registry);
            Ok(())
        }
        Command::Run(args) => run(&registry, config, args),
    }
}
