use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use crate::{CyberdeckError, Result};

/// A guided meditation recording with a known length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub name: String,
    pub duration_seconds: u32,
}

impl AudioClip {
    /// Builds a clip, deriving its display name from the file stem.
    pub fn new(path: impl Into<PathBuf>, duration_seconds: u32) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            duration_seconds,
        }
    }
}

/// Reports the playing time of an audio file in whole seconds.
pub trait DurationProbe {
    fn probe(&self, path: &Path) -> Result<u32>;
}

/// [`DurationProbe`] backed by `ffprobe`'s JSON output.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl DurationProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<u32> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-i"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|err| probe_error(path, err.to_string()))?;

        if !output.status.success() {
            return Err(probe_error(path, format!("exited with {}", output.status)));
        }

        parse_ffprobe_duration(&output.stdout).map_err(|reason| probe_error(path, reason))
    }
}

fn probe_error(path: &Path, reason: String) -> CyberdeckError {
    CyberdeckError::Probe {
        path: path.to_path_buf(),
        reason,
    }
}

/// Extracts `format.duration` from `ffprobe -print_format json` output,
/// truncated to whole seconds. Zero-length files are rejected.
pub fn parse_ffprobe_duration(stdout: &[u8]) -> std::result::Result<u32, String> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|err| format!("unparsable output: {err}"))?;

    let seconds = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| "no duration reported".to_string())?;

    if !seconds.is_finite() || seconds < 1.0 {
        return Err(format!("unusable duration {seconds}"));
    }

    Ok(seconds.min(f64::from(u32::MAX)) as u32)
}

/// Every clip in a directory that probed successfully.
#[derive(Debug, Default, Clone)]
pub struct ClipCatalog {
    clips: Vec<Arc<AudioClip>>,
}

impl ClipCatalog {
    pub fn new(clips: Vec<AudioClip>) -> Self {
        Self {
            clips: clips.into_iter().map(Arc::new).collect(),
        }
    }

    /// Probes every regular file in `directory`. Files that fail to probe are
    /// skipped, and a missing or unreadable directory yields an empty catalog.
    pub fn load(directory: &Path, probe: &dyn DurationProbe) -> Self {
        let entries = match std::fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(directory = %directory.display(), %err, "clip directory unavailable");
                return Self::default();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut clips = Vec::with_capacity(paths.len());
        for path in paths {
            match probe.probe(&path) {
                Ok(0) => tracing::debug!(path = %path.display(), "skipping empty clip"),
                Ok(duration) => {
                    tracing::debug!(path = %path.display(), duration, "loaded clip");
                    clips.push(Arc::new(AudioClip::new(path, duration)));
                }
                Err(err) => tracing::debug!(%err, "skipping clip"),
            }
        }

        tracing::info!(count = clips.len(), "clip catalog loaded");
        Self { clips }
    }

    pub fn clips(&self) -> &[Arc<AudioClip>] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AudioClip>> {
        self.clips.iter()
    }
}
