use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

/// Logical backlight power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklightState {
    On,
    Off,
}

impl BacklightState {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Value understood by the `bl_power` sysfs attribute, where `0` means
    /// powered.
    pub fn control_value(self) -> &'static [u8] {
        match self {
            Self::On => b"0\n",
            Self::Off => b"1\n",
        }
    }
}

/// Something the backlight state can be written to.
pub trait BacklightSurface {
    fn write_state(&mut self, state: BacklightState) -> std::io::Result<()>;
}

/// The sysfs power attribute of a panel backlight.
#[derive(Debug, Clone)]
pub struct FileBacklight {
    path: PathBuf,
}

impl FileBacklight {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BacklightSurface for FileBacklight {
    fn write_state(&mut self, state: BacklightState) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(state.control_value())
    }
}

/// Single writer for the backlight. Every call is a direct write; failures
/// are logged and swallowed so a flaky panel never stops a session.
#[derive(Debug)]
pub struct BacklightDriver<S> {
    surface: S,
}

impl<S: BacklightSurface> BacklightDriver<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    /// Writes `state`, returning whether the write succeeded.
    pub fn set(&mut self, state: BacklightState) -> bool {
        match self.surface.write_state(state) {
            Ok(()) => {
                tracing::trace!(?state, "backlight written");
                true
            }
            Err(err) => {
                tracing::warn!(?state, %err, "failed to write backlight state");
                false
            }
        }
    }

    pub fn set_backlight(&mut self, enabled: bool) -> bool {
        self.set(BacklightState::from_enabled(enabled))
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
