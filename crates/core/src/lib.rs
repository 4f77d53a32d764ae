//! Core library for the cyberdeck controller.
//!
//! The crate holds the meditation session engine: loading guided meditation
//! clips, fitting a random selection of them into a session, playing them
//! through an external player while the panel backlight "breathes", and
//! drawing the heartbeat overlay between them. Operating system collaborators
//! (player processes, the backlight attribute, terminal size) sit behind small
//! traits so the engine can be driven deterministically in tests.

pub mod backlight;
pub mod catalog;
pub mod config;
pub mod error;
pub mod playback;
pub mod render;
pub mod session;
pub mod timeline;

pub use backlight::{BacklightDriver, BacklightState, BacklightSurface, FileBacklight};
pub use catalog::{AudioClip, ClipCatalog, DurationProbe, FfprobeProbe};
pub use config::{AppConfig, BacklightConfig, MeditationConfig, PlaybackConfig, ProbeConfig};
pub use error::{CyberdeckError, Result};
pub use playback::{
    CancellationToken, CommandPlayer, DutyCycle, PlaybackController, PlaybackEvent,
    PlaybackResult, PlaybackState, PlayerProcess, PlayerSpawner,
};
pub use render::{DisplayRenderer, Frame, GeometrySource, HighlightMode, TerminalGeometry};
pub use session::{SessionOutcome, SessionRunner};
pub use timeline::{humanize_duration, ScheduledClip, SessionPlan, SessionPlanner};
