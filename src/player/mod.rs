//! The playback orchestrator.
//!
//! [`Player`] owns the loaded files, the file and track playlists, the active
//! decoder and the subscriber list, all behind a single mutex. It is cheap to
//! clone: every clone controls the same player, so one clone can live on the
//! audio thread and call [`Player::render`] while another takes commands.
//!
//! Reading files from disk happens before the lock is taken. Everything the
//! render path needs (including the data of files it may auto-advance into)
//! is already in memory.

mod engine;
mod render;

use crate::config::PlayerOptions;
use crate::decoder::DecoderBackend;
use crate::error::{ErrorKind, PlayerError, Result};
use crate::events::{EventKind, PlayerEvent, SubscriptionId};
use crate::metadata::Metadata;
use crate::playlist::PlaylistKind;
use crate::SAMPLE_RATE;
use engine::{Engine, LoadedFile};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No track is loaded.
    #[default]
    Empty,
    /// A track is loaded but not playing.
    Stopped,
    /// The render callback produces audio.
    Playing,
    /// Playing was interrupted and can resume where it left off.
    Paused,
}

/// Handle to a shared player.
#[derive(Clone)]
pub struct Player {
    engine: Arc<Mutex<Engine>>,
    backend: Arc<dyn DecoderBackend>,
}

impl Player {
    /// Create a player that opens files with `backend`.
    pub fn new(backend: Arc<dyn DecoderBackend>, options: PlayerOptions) -> Self {
        log::debug!("player created with {} backend", backend.name());
        Self {
            engine: Arc::new(Mutex::new(Engine::new(Arc::clone(&backend), options))),
            backend,
        }
    }

    /// Create a player backed by the YM decoder.
    #[cfg(feature = "ym-backend")]
    pub fn with_ym_backend(options: PlayerOptions) -> Self {
        Self::new(Arc::new(crate::decoder::YmBackend), options)
    }

    // ---- files ----

    /// Add a file to the end of the file playlist.
    ///
    /// The file is read and test-opened before the player is touched; a file
    /// that fails to open leaves the playlist unchanged. With autoplay on and
    /// nothing loaded, the first file starts playing.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = match self.read_file(path) {
            Ok(file) => file,
            Err(err) => return Err(self.engine.lock().report(err)),
        };

        let mut engine = self.engine.lock();
        engine.push_file(file);
        if engine.options.autoplay && engine.decoder.is_none() {
            let loaded = engine.load_pair(0, 0);
            engine.reported(loaded)?;
            engine.start_or_resume();
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<LoadedFile> {
        let data = fs::read(path)
            .map_err(|e| PlayerError::new(ErrorKind::LoadFile, e.to_string()).with_file(path))?;
        self.backend
            .create()
            .open(&data, SAMPLE_RATE)
            .map_err(|e| PlayerError::from(e).with_file(path))?;
        let m3u = fs::read_to_string(path.with_extension("m3u")).ok();
        if m3u.is_some() {
            log::debug!("found companion m3u for {}", path.display());
        }
        Ok(LoadedFile {
            path: path.to_path_buf(),
            data,
            m3u,
        })
    }

    /// Add several files. Returns the errors of the files that failed and the
    /// number of files added.
    pub fn add_files<I, P>(&self, paths: I) -> (Vec<PlayerError>, usize)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut errors = Vec::new();
        let mut added = 0;
        for path in paths {
            match self.add_file(path) {
                Ok(()) => added += 1,
                Err(e) => errors.push(e),
            }
        }
        (errors, added)
    }

    /// Remove the file at playlist position `pos`. Removing the loaded file
    /// unloads it. Returns `false` if there is no such position.
    pub fn remove_file(&self, pos: usize) -> bool {
        self.engine.lock().remove_file(pos)
    }

    /// Unload everything.
    pub fn clear(&self) {
        self.engine.lock().clear();
    }

    // ---- selection ----

    /// Open the file at playlist position `pos` without selecting a track.
    pub fn load_file(&self, pos: usize) -> Result<()> {
        let mut engine = self.engine.lock();
        let loaded = engine.load_file(pos);
        engine.reported(loaded)?;
        if matches!(
            engine.state,
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            engine.state = PlaybackState::Stopped;
            engine.emit(PlayerEvent::Stopped);
        }
        Ok(())
    }

    /// Start the track at playlist position `pos` of the loaded file.
    pub fn load_track(&self, pos: usize) -> Result<()> {
        let mut engine = self.engine.lock();
        let loaded = engine.load_track(pos);
        engine.reported(loaded)
    }

    /// Load a file and one of its tracks in a single step.
    pub fn load_pair(&self, file: usize, track: usize) -> Result<()> {
        let mut engine = self.engine.lock();
        let loaded = engine.load_pair(file, track);
        engine.reported(loaded)
    }

    // ---- transport ----

    /// Start playing, or resume after a pause.
    pub fn start_or_resume(&self) {
        self.engine.lock().start_or_resume();
    }

    /// Pause playback.
    pub fn pause(&self) {
        self.engine.lock().pause();
    }

    /// Pause when playing, play otherwise.
    pub fn play_pause(&self) {
        let mut engine = self.engine.lock();
        if engine.state == PlaybackState::Playing {
            engine.pause();
        } else {
            engine.start_or_resume();
        }
    }

    /// Stop and rewind the current track.
    pub fn stop(&self) -> Result<()> {
        let mut engine = self.engine.lock();
        let stopped = engine.stop();
        engine.reported(stopped)
    }

    /// Jump to `ms`, clamped to the track.
    pub fn seek(&self, ms: i64) -> Result<()> {
        let mut engine = self.engine.lock();
        let sought = engine.seek(ms);
        engine.reported(sought)
    }

    /// Jump `offset` ms forward (or back, when negative).
    pub fn seek_relative(&self, offset: i64) -> Result<()> {
        let mut engine = self.engine.lock();
        let sought = engine.seek_relative(offset);
        engine.reported(sought)
    }

    /// Go to the next track, or the first track of the next file. Past the
    /// end of both playlists the player stops.
    pub fn next(&self) -> Result<()> {
        let mut engine = self.engine.lock();
        let moved = engine.navigate(true);
        engine.reported(moved)
    }

    /// Go to the previous track, or the last track of the previous file.
    pub fn prev(&self) -> Result<()> {
        let mut engine = self.engine.lock();
        let moved = engine.navigate(false);
        engine.reported(moved)
    }

    /// Whether [`Player::next`] has somewhere to go.
    pub fn has_next(&self) -> bool {
        self.engine.lock().has_next()
    }

    /// Whether [`Player::prev`] has somewhere to go.
    pub fn has_prev(&self) -> bool {
        self.engine.lock().has_prev()
    }

    // ---- playlists ----

    /// Shuffle one playlist. The current entry stays current.
    pub fn shuffle(&self, which: PlaylistKind) {
        let mut engine = self.engine.lock();
        engine.playlist_mut(which).shuffle();
        engine.emit(PlayerEvent::Shuffled(which));
    }

    /// Swap entry `pos` with the one `delta` places away. Returns the entry's
    /// new position.
    pub fn move_entry(&self, which: PlaylistKind, pos: usize, delta: isize) -> usize {
        let mut engine = self.engine.lock();
        let moved = engine.playlist_mut(which).move_entry(pos, delta);
        engine.emit(PlayerEvent::PlaylistChanged(which));
        moved
    }

    /// Write one entry per line in playlist order: file paths for the file
    /// playlist, track titles for the track playlist.
    pub fn save_playlist<W: Write>(&self, which: PlaylistKind, out: &mut W) -> io::Result<()> {
        let lines: Vec<String> = {
            let engine = self.engine.lock();
            match which {
                PlaylistKind::File => engine
                    .file_list
                    .order()
                    .iter()
                    .map(|&id| engine.files[id].path.display().to_string())
                    .collect(),
                PlaylistKind::Track => engine.names(PlaylistKind::Track),
            }
        };
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    // ---- effects and options ----

    /// Mute or unmute a channel. The setting carries over to later files.
    pub fn mute_channel(&self, index: usize, mute: bool) {
        self.engine.lock().mute_channel(index, mute);
    }

    /// Set a channel volume, `0..=128` with 64 as unity gain.
    pub fn set_channel_volume(&self, index: usize, value: u8) {
        self.engine.lock().set_channel_volume(index, value);
    }

    /// Fade-out length in ms at the end of each track.
    pub fn set_fade(&self, ms: u64) {
        self.engine.lock().set_fade(ms);
    }

    /// Playback speed multiplier, clamped to `0.25..=4.0`.
    pub fn set_tempo(&self, tempo: f64) {
        self.engine.lock().set_tempo(tempo);
    }

    /// Master volume, `0..=128`.
    pub fn set_volume(&self, volume: u8) {
        self.engine.lock().set_volume(volume);
    }

    /// Repeat the current track forever.
    pub fn set_track_repeat(&self, repeat: bool) {
        let mut engine = self.engine.lock();
        let file = engine.options.file_repeat;
        engine.set_repeat(file, repeat);
    }

    /// Restart the current file when its tracks run out.
    pub fn set_file_repeat(&self, repeat: bool) {
        let mut engine = self.engine.lock();
        let track = engine.options.track_repeat;
        engine.set_repeat(repeat, track);
    }

    /// Start playing as soon as the first file is added.
    pub fn set_autoplay(&self, autoplay: bool) {
        self.engine.lock().options.autoplay = autoplay;
    }

    /// Length given to tracks without length information. Applies from the
    /// next file load.
    pub fn set_default_duration(&self, ms: u64) {
        self.engine.lock().options.default_duration = ms;
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> PlayerOptions {
        self.engine.lock().options.clone()
    }

    // ---- queries ----

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.engine.lock().state
    }

    /// Whether the render path produces audio.
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Position in the current track, in ms.
    pub fn position(&self) -> u64 {
        self.engine.lock().position()
    }

    /// Length of the current track, in ms.
    pub fn length(&self) -> u64 {
        self.engine.lock().length()
    }

    /// Playlist position of the loaded file.
    pub fn current_file(&self) -> Option<usize> {
        self.engine.lock().file_list.current()
    }

    /// Playlist position of the current track.
    pub fn current_track(&self) -> Option<usize> {
        self.engine.lock().track_list.current()
    }

    /// Number of files in the playlist.
    pub fn file_count(&self) -> usize {
        self.engine.lock().files.len()
    }

    /// Number of tracks in the loaded file.
    pub fn track_count(&self) -> usize {
        self.engine.lock().tracks.len()
    }

    /// Path of the file at playlist position `pos`.
    pub fn file_path(&self, pos: usize) -> Option<PathBuf> {
        let engine = self.engine.lock();
        let id = engine.file_list.get(pos)?;
        Some(engine.files[id].path.clone())
    }

    /// Metadata of the track at playlist position `pos`.
    pub fn track_info(&self, pos: usize) -> Option<Metadata> {
        let engine = self.engine.lock();
        let id = engine.track_list.get(pos)?;
        engine.tracks.get(id).cloned()
    }

    /// Display names of one playlist, in playlist order.
    pub fn names(&self, which: PlaylistKind) -> Vec<String> {
        self.engine.lock().names(which)
    }

    /// Channel names reported by the loaded decoder.
    pub fn channel_names(&self) -> Vec<String> {
        let engine = self.engine.lock();
        engine.decoder.as_ref().map_or_else(Vec::new, |d| {
            (0..d.channel_count()).map(|i| d.channel_name(i)).collect()
        })
    }

    /// Whether the loaded file exposes more than one mixable channel.
    pub fn is_multi_channel(&self) -> bool {
        let engine = self.engine.lock();
        engine.decoder.as_ref().is_some_and(|d| d.channel_count() > 1)
    }

    // ---- notifications ----

    /// Receive every event. See [`crate::events`] for the threading rules.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PlayerEvent<'_>) + Send + 'static,
    {
        self.engine.lock().events.subscribe(callback)
    }

    /// Receive events of one kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&PlayerEvent<'_>) + Send + 'static,
    {
        self.engine.lock().events.on(kind, callback)
    }

    /// Remove a subscriber. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.engine.lock().events.unsubscribe(id)
    }

    // ---- audio ----

    /// Render interleaved stereo samples at [`SAMPLE_RATE`].
    ///
    /// Called from the audio thread. Produces silence unless playing, and
    /// advances to the next track when the current one ends. `out` may have
    /// any length; samples of a decoded block that do not fit are kept for
    /// the next call.
    pub fn render(&self, out: &mut [f32]) {
        self.engine.lock().render(out);
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = self.engine.lock();
        f.debug_struct("Player")
            .field("backend", &self.backend.name())
            .field("state", &engine.state)
            .field("files", &engine.files.len())
            .field("tracks", &engine.tracks.len())
            .finish()
    }
}
