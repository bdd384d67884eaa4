//! Error types for decoding and playback.
//!
//! Decoders report a [`DecodeError`] with a fine-grained [`DecodeErrorKind`].
//! The [`Player`](crate::Player) collapses those into the coarser
//! [`ErrorKind`] of a [`PlayerError`], which also carries the file and track
//! the error belongs to so it can be displayed without further lookups.

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for decoder operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Decoder-level error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// Unrecognized container format.
    FileType,
    /// Recognized format with a malformed header.
    Header,
    /// Internal error while producing samples.
    Play,
    /// Seek rejected by the backend.
    Seek,
    /// Allocation or load failure (including decompression).
    LoadFile,
    /// Track out of range or rejected by the backend.
    LoadTrack,
    /// Companion m3u file could not be read or parsed.
    LoadM3u,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileType => "Invalid music file type",
            Self::Header => "Invalid music file header",
            Self::Play => "Found an error while playing",
            Self::Seek => "Seek error",
            Self::LoadFile => "Couldn't load file",
            Self::LoadTrack => "Couldn't load track",
            Self::LoadM3u => "Couldn't load m3u file",
        })
    }
}

/// Error reported by a [`Decoder`](crate::decoder::Decoder).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {details}")]
pub struct DecodeError {
    /// Error category.
    pub kind: DecodeErrorKind,
    /// Backend-provided detail message.
    pub details: String,
}

impl DecodeError {
    /// Create a decoder error.
    pub fn new(kind: DecodeErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    /// Shorthand for a [`DecodeErrorKind::FileType`] error.
    pub fn file_type(details: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::FileType, details)
    }

    /// Shorthand for a [`DecodeErrorKind::Header`] error.
    pub fn header(details: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::Header, details)
    }

    /// Shorthand for a [`DecodeErrorKind::LoadFile`] error.
    pub fn load_file(details: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::LoadFile, details)
    }
}

/// Player-level error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Mid-stream decode failure.
    Play,
    /// Seek failure.
    Seek,
    /// The file could not be read, identified or opened.
    LoadFile,
    /// The track (or its companion metadata) could not be loaded.
    LoadTrack,
}

impl From<DecodeErrorKind> for ErrorKind {
    fn from(kind: DecodeErrorKind) -> Self {
        match kind {
            DecodeErrorKind::FileType | DecodeErrorKind::Header | DecodeErrorKind::LoadFile => {
                ErrorKind::LoadFile
            }
            DecodeErrorKind::LoadTrack | DecodeErrorKind::LoadM3u => ErrorKind::LoadTrack,
            DecodeErrorKind::Play => ErrorKind::Play,
            DecodeErrorKind::Seek => ErrorKind::Seek,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Play => "playback error",
            Self::Seek => "seek error",
            Self::LoadFile => "couldn't load file",
            Self::LoadTrack => "couldn't load track",
        })
    }
}

/// Error surfaced by the [`Player`](crate::Player).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub struct PlayerError {
    /// Error category.
    pub kind: ErrorKind,
    /// Detail message.
    pub details: String,
    /// File the error originated from, if any.
    pub file_path: Option<PathBuf>,
    /// Display name of the track involved, if any.
    pub track_name: Option<String>,
}

impl PlayerError {
    /// Create an error without file or track context.
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
            file_path: None,
            track_name: None,
        }
    }

    /// Attach the originating file.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attach the track display name.
    pub fn with_track(mut self, name: impl Into<String>) -> Self {
        self.track_name = Some(name.into());
        self
    }
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.file_path {
            write!(f, "{}: ", path.display())?;
        }
        if let Some(track) = &self.track_name {
            write!(f, "{track}: ")?;
        }
        write!(f, "{}: {}", self.kind, self.details)
    }
}

impl From<DecodeError> for PlayerError {
    fn from(err: DecodeError) -> Self {
        PlayerError::new(err.kind.into(), err.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_time_kinds_collapse_to_load_file() {
        for kind in [
            DecodeErrorKind::FileType,
            DecodeErrorKind::Header,
            DecodeErrorKind::LoadFile,
        ] {
            assert_eq!(ErrorKind::from(kind), ErrorKind::LoadFile);
        }
    }

    #[test]
    fn m3u_errors_collapse_to_load_track() {
        let err: PlayerError = DecodeError::new(DecodeErrorKind::LoadM3u, "bad line").into();
        assert_eq!(err.kind, ErrorKind::LoadTrack);
        assert_eq!(err.details, "bad line");
    }

    #[test]
    fn display_includes_context() {
        let err = PlayerError::new(ErrorKind::Play, "emulation fault")
            .with_file("music/song.ym")
            .with_track("Intro");
        let text = err.to_string();
        assert!(text.starts_with("music/song.ym: Intro: "), "got {text}");
        assert!(text.ends_with("playback error: emulation fault"));
    }

    #[test]
    fn decode_error_display() {
        let err = DecodeError::header("missing signature");
        assert_eq!(err.to_string(), "Invalid music file header: missing signature");
    }
}
