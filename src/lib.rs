//! Game music playback engine.
//!
//! `gmplayer` loads chiptune files, keeps a two-level playlist (files, and
//! the tracks inside the selected file) and renders audio through a pull
//! callback meant to be driven by an audio thread.
//!
//! # Overview
//!
//! - [`Player`] is the orchestrator. It is a cheap, cloneable handle; the
//!   control thread calls its commands while the audio thread calls
//!   [`Player::render`].
//! - Formats are plugged in through [`DecoderBackend`]. The bundled
//!   [`YmBackend`] (feature `ym-backend`) plays YM register dumps on an
//!   emulated YM2149.
//! - State changes are reported as [`PlayerEvent`]s to subscribers.
//!
//! # Example
//!
//! ```no_run
//! use gmplayer::{Player, PlayerEvent, PlayerOptions};
//!
//! let player = Player::with_ym_backend(PlayerOptions::default());
//! player.subscribe(|event| {
//!     if let PlayerEvent::TrackChanged { metadata, .. } = event {
//!         println!("now playing: {}", metadata.song());
//!     }
//! });
//! player.add_file("music/Decade.ym")?;
//! player.load_pair(0, 0)?;
//! player.start_or_resume();
//!
//! let mut buffer = vec![0.0f32; gmplayer::SAMPLES_PER_BLOCK];
//! player.render(&mut buffer);
//! # Ok::<(), gmplayer::PlayerError>(())
//! ```
//!
//! # Feature flags
//!
//! - `ym-backend` (default): YM file decoder.
//! - `streaming`: rodio output ([`output::AudioOutput`]).
//! - `cli`: the `gmplayer` console binary.

#![warn(missing_docs)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod metadata;
#[cfg(feature = "streaming")]
pub mod output;
pub mod player;
pub mod playlist;

pub use config::{ConfigError, PlayerOptions};
pub use decoder::{Decoder, DecoderBackend, SampleBlock};
#[cfg(feature = "ym-backend")]
pub use decoder::{YmBackend, YmDecoder};
pub use error::{DecodeError, DecodeErrorKind, ErrorKind, PlayerError, Result};
pub use events::{EventKind, PlayerEvent, SubscriptionId};
pub use metadata::{format_metadata, int_to_tempo, tempo_to_int, Metadata, MetadataField};
pub use player::{PlaybackState, Player};
pub use playlist::{Playlist, PlaylistKind};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved output channels.
pub const CHANNELS: usize = 2;

/// Stereo frames per rendered block.
pub const FRAMES_PER_BLOCK: usize = 2048;

/// Interleaved samples per rendered block.
pub const SAMPLES_PER_BLOCK: usize = FRAMES_PER_BLOCK * CHANNELS;

/// Upper bound of master and channel volume.
pub const MAX_VOLUME: u8 = 128;

/// Channel volume that maps to unity gain.
pub const DEFAULT_CHANNEL_VOLUME: u8 = MAX_VOLUME / 2;

/// Size of the per-channel mute and volume tables.
pub const NUM_CHANNELS: usize = 8;
