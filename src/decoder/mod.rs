//! Decoder abstraction.
//!
//! A [`Decoder`] turns the bytes of one music file into fixed-size blocks of
//! interleaved 16-bit stereo samples. The player only talks to this trait and
//! obtains instances from a [`DecoderBackend`], so supporting another format
//! means adding a backend, not touching the player.

use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::metadata::Metadata;
use crate::SAMPLES_PER_BLOCK;
use std::fs;
use std::path::Path;

pub mod compression;
pub mod m3u;
#[cfg(feature = "ym-backend")]
pub mod psg;
#[cfg(feature = "ym-backend")]
pub mod ym;

#[cfg(feature = "ym-backend")]
pub use ym::{YmBackend, YmDecoder};

/// One block of interleaved stereo samples.
pub type SampleBlock = [i16; SAMPLES_PER_BLOCK];

/// Capabilities the player needs from a format backend.
///
/// Every method runs under the player lock, most of them on the audio
/// thread. Implementations must not block or perform I/O in [`Decoder::play`].
pub trait Decoder: Send {
    /// Open a file from memory. Fails with `FileType`, `Header` or `LoadFile`.
    fn open(&mut self, data: &[u8], sample_rate: u32) -> DecodeResult<()>;

    /// Read and apply a companion m3u file.
    fn load_m3u(&mut self, path: &Path) -> DecodeResult<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            DecodeError::new(
                DecodeErrorKind::LoadM3u,
                format!("{}: {e}", path.display()),
            )
        })?;
        self.load_m3u_data(&text)
    }

    /// Apply m3u text that was already read. Backends without m3u support
    /// ignore it.
    fn load_m3u_data(&mut self, _text: &str) -> DecodeResult<()> {
        Ok(())
    }

    /// Select a track and rewind to its start. Fails with `LoadTrack`.
    fn start_track(&mut self, index: usize) -> DecodeResult<()>;

    /// Produce the next block. Fails with `Play`.
    fn play(&mut self) -> DecodeResult<&SampleBlock>;

    /// Jump to a position in milliseconds. Clears any fade set with
    /// [`Decoder::set_fade`]. Fails with `Seek`.
    fn seek(&mut self, ms: u64) -> DecodeResult<()>;

    /// Current position in milliseconds.
    fn position(&self) -> u64;

    /// Number of tracks in the open file.
    fn track_count(&self) -> usize;

    /// Metadata of a track. Tracks without length information get a length
    /// derived by [`track_length`](crate::metadata::track_length).
    fn track_metadata(&self, index: usize, default_length: u64) -> Metadata;

    /// Whether the current track has finished.
    fn track_ended(&self) -> bool;

    /// Number of mixable channels.
    fn channel_count(&self) -> usize;

    /// Display name of a channel.
    fn channel_name(&self, index: usize) -> String;

    /// Mute or unmute a channel.
    fn mute_channel(&mut self, index: usize, mute: bool);

    /// Fade out over `length` ms starting at `from` ms.
    fn set_fade(&mut self, from: u64, length: u64);

    /// Playback speed multiplier.
    fn set_tempo(&mut self, tempo: f64);

    /// Per-channel linear gain, 1.0 being unity.
    fn set_channel_volume(&mut self, _index: usize, _gain: f32) {}
}

/// Factory for decoders of one family of formats.
pub trait DecoderBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Create a fresh, unopened decoder.
    fn create(&self) -> Box<dyn Decoder>;
}
