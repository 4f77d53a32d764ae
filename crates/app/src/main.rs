use std::{io, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use cyberdeck_core::{
    humanize_duration, AppConfig, BacklightDriver, BacklightState, BacklightSurface,
    CancellationToken, ClipCatalog, CommandPlayer, CyberdeckError, FfprobeProbe, FileBacklight,
    GeometrySource, PlaybackController, SessionOutcome, SessionRunner, TerminalGeometry,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn main() -> cyberdeck_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Meditate { duration } => {
            run_meditate(&config, duration.unwrap_or(config.meditation.default_minutes))
        }
        Commands::Catalog => run_catalog(&config),
        Commands::Backlight { state } => run_backlight(&config, state.into()),
    }
}

fn run_meditate(config: &AppConfig, minutes: u32) -> cyberdeck_core::Result<()> {
    tracing::info!(minutes, "starting meditation session");

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|err| CyberdeckError::msg(format!("failed to install interrupt handler: {err}")))?;

    let probe = FfprobeProbe::new(&config.probe.ffprobe);
    let catalog = ClipCatalog::load(&config.meditation.clip_directory, &probe);

    let backlight = BacklightDriver::new(FileBacklight::new(&config.backlight.power_path));
    let controller = PlaybackController::from_config(
        CommandPlayer::new(&config.playback.player),
        backlight,
        cancel,
        &config.playback,
    )?;
    let mut runner = SessionRunner::new(
        controller,
        CrosstermGeometry,
        StdRng::from_entropy(),
        io::stdout(),
    );

    let budget = minutes.saturating_mul(60);
    match runner.run(&catalog, budget, &config.meditation.alarm_path) {
        Ok(outcome) => {
            print!("\x1b[0m");
            if outcome == SessionOutcome::Interrupted {
                eprintln!("meditation interrupted");
            }
            tracing::info!(?outcome, "meditation session ended");
            Ok(())
        }
        Err(err) if err.is_no_clips() => {
            tracing::debug!(%err, "nothing to play");
            eprintln!("error: no meditations available");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn run_catalog(config: &AppConfig) -> cyberdeck_core::Result<()> {
    let directory = &config.meditation.clip_directory;
    println!("Loading Meditations from {}", directory.display());

    let probe = FfprobeProbe::new(&config.probe.ffprobe);
    let catalog = ClipCatalog::load(directory, &probe);
    for clip in catalog.iter() {
        println!(
            "  {} ... {}",
            clip.name,
            humanize_duration(u64::from(clip.duration_seconds))
        );
    }
    if catalog.is_empty() {
        eprintln!("error: no meditations available");
    }
    Ok(())
}

fn run_backlight(config: &AppConfig, state: BacklightState) -> cyberdeck_core::Result<()> {
    let mut backlight = FileBacklight::new(&config.backlight.power_path);
    tracing::info!(?state, path = %backlight.path().display(), "setting backlight");
    backlight.write_state(state)?;
    Ok(())
}

/// Terminal size as reported by crossterm, sampled at every frame.
struct CrosstermGeometry;

impl GeometrySource for CrosstermGeometry {
    fn geometry(&self) -> TerminalGeometry {
        crossterm::terminal::size()
            .map(|(columns, lines)| TerminalGeometry::new(columns, lines))
            .unwrap_or(TerminalGeometry::FALLBACK)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Cyberdeck controller", long_about = None)]
struct Cli {
    /// Configuration file; defaults to the per-user config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a guided meditation session followed by an alarm.
    Meditate {
        /// Session length in minutes.
        #[arg(short, long)]
        duration: Option<u32>,
    },
    /// List the meditations found in the clip directory.
    Catalog,
    /// Switch the touchscreen backlight on or off.
    Backlight {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for BacklightState {
    fn from(value: Switch) -> Self {
        match value {
            Switch::On => BacklightState::On,
            Switch::Off => BacklightState::Off,
        }
    }
}
