use std::path::PathBuf;

/// Result alias that carries the custom [`CyberdeckError`] type.
pub type Result<T> = std::result::Result<T, CyberdeckError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CyberdeckError {
    /// Free-form failure surfaced to the command line as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The clip directory produced no playable clips.
    #[error("no meditations available")]
    EmptyCatalog,
    /// The budget is smaller than every clip in the catalog.
    #[error("no meditation fits in the requested session length")]
    NoClipsSelected,
    /// The duration probe could not report a usable length for a file.
    #[error("failed to probe `{}`: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },
    /// The audio player could not be started.
    #[error("failed to start player for `{}`: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(String),
    /// The configuration parsed but holds values the engine cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CyberdeckError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// True for the two "nothing to play" conditions the CLI reports without
    /// failing.
    pub fn is_no_clips(&self) -> bool {
        matches!(self, Self::EmptyCatalog | Self::NoClipsSelected)
    }
}

impl From<&str> for CyberdeckError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CyberdeckError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<toml::de::Error> for CyberdeckError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config(value.to_string())
    }
}
