//! Command-line tooling for the pointer control engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use headmouse::constants::SETTINGS_FILE;
use headmouse::cursor_control::{Command, CursorController, PlatformCaps};
use headmouse::process::{ProcessLoop, TickInput};
use headmouse::settings::ThresholdConfig;
use headmouse::synthetic::{ScriptedEyes, StaticCapture, VirtualPointer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the stored threshold settings
    Show {
        /// Settings file to read
        #[arg(short, long, default_value = SETTINGS_FILE)]
        file: PathBuf,
    },
    /// Write default threshold settings
    Init {
        /// Settings file to write
        #[arg(short, long, default_value = SETTINGS_FILE)]
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Run the engine against synthetic inputs and print what happened
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "40")]
        ticks: u32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    match args.action {
        Action::Show { file } => show_settings(&file),
        Action::Init { file, force } => init_settings(&file, force)?,
        Action::Simulate { ticks } => simulate(ticks)?,
    }
    Ok(())
}

fn show_settings(file: &Path) {
    let settings = ThresholdConfig::load(file);
    println!("Settings from {}:", file.display());
    println!("  blink frame threshold: {}", settings.blink_frame_threshold);
    println!("  eye aspect ratio:      {}", settings.ear_threshold);
    println!("  up threshold:          {}", settings.up_threshold);
    println!("  left threshold:        {}", settings.left_threshold);
    println!("  down threshold:        {}", settings.down_threshold);
    println!("  right threshold:       {}", settings.right_threshold);
    println!("  cursor sensitivity:    {}", settings.cursor_sensitivity);
    println!("  scroll sensitivity:    {}", settings.scroll_sensitivity);
}

fn init_settings(file: &Path, force: bool) -> Result<()> {
    if file.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", file.display());
    }
    ThresholdConfig::default().save(file)?;
    info!("Wrote default settings to {}", file.display());
    Ok(())
}

/// Drive the full loop with synthetic frames: a blink in the first six
/// ticks, a zoom command queued at tick eight, open eyes for the rest.
/// The face carries a slight depth tilt, so the pose solve produces
/// non-trivial angles and the pointer may drift while a direction fires.
fn simulate(ticks: u32) -> Result<()> {
    info!("Simulating {ticks} ticks against synthetic inputs");
    let settings = ThresholdConfig::default();

    let pointer = VirtualPointer::new(1920, 1080);
    let state = pointer.state();
    let controller = CursorController::new(Box::new(pointer), &settings, PlatformCaps::native());

    let mut script = vec![Some(0.05); 6];
    script.resize(ticks as usize, Some(0.3));
    let mut engine = ProcessLoop::new(
        Box::new(StaticCapture::new(640, 480)),
        Box::new(ScriptedEyes::new(script).with_depth_tilt(0.2)),
        controller,
        &settings,
    )
    .with_frame_interval(Duration::ZERO);

    let mut clicks = 0u32;
    let mut commands = 0u32;
    for tick in 0..ticks {
        let command = (tick == 8).then_some(Command::ZoomIn);
        let report = engine.tick(TickInput {
            command,
            allow_showing_frame: false,
            allow_detecting_direction: true,
        })?;
        if report.clicked {
            clicks += 1;
            info!("Tick {tick}: blink completed, clicked");
        }
        if report.command_fired {
            commands += 1;
            info!("Tick {tick}: delayed command executed");
        }
    }

    let state = state
        .lock()
        .map_err(|_| anyhow::anyhow!("pointer state poisoned"))?;
    println!(
        "Ran {ticks} ticks: {clicks} clicks, {commands} commands, {} pointer events",
        state.events.len()
    );
    for event in &state.events {
        println!("  {event:?}");
    }
    Ok(())
}
