use anyhow::{Context, Result};
use clap::Parser;
use emu_atari7800::database::CompatibilityDatabase;
use emu_atari7800::{Atari7800System, ConsoleSwitches, InputSnapshot, JoystickState};
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::System;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prosystem", about = "Run an Atari 7800 cartridge headless")]
struct Args {
    /// Cartridge image (.a78 or headerless .bin)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Compatibility database (JSON object keyed by MD5 digest)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Restore this save state before running
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write a save state here after the last frame
    #[arg(long)]
    save: Option<PathBuf>,

    /// Hold the joystick button down for every frame
    #[arg(long, default_value_t = false)]
    fire: bool,

    /// Hold PAUSE down for every frame
    #[arg(long, default_value_t = false)]
    pause: bool,

    /// Core log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Per-category core log levels, e.g. "cartridge=debug,interrupts=trace"
    #[arg(long)]
    log: Option<String>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print cartridge information as JSON
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress per-frame output
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    let level = LogLevel::from_str(&args.log_level)
        .with_context(|| format!("unknown log level '{}'", args.log_level))?;
    config.set_global_level(level);

    if let Some(levels) = &args.log {
        for entry in levels.split(',').filter(|e| !e.is_empty()) {
            let (name, level) = entry
                .split_once('=')
                .with_context(|| format!("expected category=level, got '{}'", entry))?;
            let category = LogCategory::from_str(name)
                .with_context(|| format!("unknown log category '{}'", name))?;
            let level = LogLevel::from_str(level)
                .with_context(|| format!("unknown log level '{}'", level))?;
            config.set_level(category, level);
        }
    }

    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let mut sys = Atari7800System::new();
    if let Some(path) = &args.database {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read database {}", path.display()))?;
        let database = CompatibilityDatabase::from_json(&text)?;
        log::info!("Loaded {} database entries", database.len());
        sys.set_database(database);
    }

    let rom = fs::read(&args.rom).with_context(|| format!("cannot read {}", args.rom.display()))?;
    sys.mount("Cartridge", &rom)?;
    if let Some(info) = sys.debug_info() {
        log::info!(
            "Mounted \"{}\" ({} bytes, {:?}, {:?})",
            info.title,
            info.rom_size,
            info.scheme,
            info.region
        );
        if args.debug {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    if let Some(path) = &args.load {
        let state = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        sys.load_state(&state)?;
        log::info!("Restored state from {}", path.display());
    }

    sys.set_input(InputSnapshot {
        players: [
            JoystickState {
                button1: args.fire,
                ..JoystickState::default()
            },
            JoystickState::default(),
        ],
        console: ConsoleSwitches {
            pause: args.pause,
            ..ConsoleSwitches::default()
        },
        light_gun: None,
    });

    for fnum in 1..=args.frames {
        let frame = sys.step_frame()?;
        if args.quiet {
            continue;
        }
        let background = frame.pixels.first().copied().unwrap_or_default();
        let drawn = frame.pixels.iter().filter(|&&p| p != background).count();
        let audio = sys.audio_samples();
        let peak = audio.iter().map(|&s| s.abs_diff(128)).max().unwrap_or(0);
        println!(
            "Frame {} ({}): {}x{}, {} non-background pixels, {} samples, peak {}",
            fnum,
            sys.frame_counter(),
            frame.width,
            frame.height,
            drawn,
            audio.len(),
            peak
        );
    }

    if let Some(path) = &args.save {
        let state = sys.save_state()?;
        fs::write(path, &state).with_context(|| format!("cannot write {}", path.display()))?;
        log::info!("Wrote {} byte state to {}", state.len(), path.display());
    }

    Ok(())
}
