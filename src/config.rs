//! Persisted player options.
//!
//! [`PlayerOptions`] is stored as JSON. Missing fields take their default
//! value and unknown fields are ignored, so files written by older or newer
//! versions still load.

use crate::metadata::MINUTE_MS;
use crate::MAX_VOLUME;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while loading or saving options.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid options JSON.
    #[error("invalid options file {}: {source}", .path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// User-tunable playback options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Fade-out length in milliseconds applied at the end of every track.
    pub fade_out: u64,
    /// Start playing as soon as the first file is added.
    pub autoplay: bool,
    /// Repeat the current track.
    pub track_repeat: bool,
    /// Restart the current file after its last track.
    pub file_repeat: bool,
    /// Length in milliseconds of tracks with no length information.
    pub default_duration: u64,
    /// Playback speed multiplier.
    pub tempo: f64,
    /// Master volume, `0..=128`.
    pub volume: u8,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            fade_out: 0,
            autoplay: false,
            track_repeat: false,
            file_repeat: false,
            default_duration: 3 * MINUTE_MS,
            tempo: 1.0,
            volume: MAX_VOLUME,
        }
    }
}

impl PlayerOptions {
    /// Load options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut options: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        options.sanitize();
        Ok(options)
    }

    /// Load options, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write options as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Clamp values into their valid ranges.
    pub fn sanitize(&mut self) {
        self.volume = self.volume.min(MAX_VOLUME);
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            self.tempo = 1.0;
        }
    }
}
