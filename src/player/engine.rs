//! Player state behind the lock.
//!
//! Every method here assumes the caller holds the player mutex. Methods that
//! can fail return the error without emitting it; the public handle decides
//! whether to report.

use super::PlaybackState;
use crate::config::PlayerOptions;
use crate::decoder::{Decoder, DecoderBackend};
use crate::error::{ErrorKind, PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::metadata::{default_track_name, Metadata, MetadataField};
use crate::playlist::{Playlist, PlaylistKind};
use crate::{
    DEFAULT_CHANNEL_VOLUME, FRAMES_PER_BLOCK, MAX_VOLUME, NUM_CHANNELS, SAMPLES_PER_BLOCK,
    SAMPLE_RATE,
};
use std::path::PathBuf;
use std::sync::Arc;

/// A file added to the player, kept in memory so the render path never
/// touches the disk.
pub(crate) struct LoadedFile {
    pub path: PathBuf,
    pub data: Vec<u8>,
    /// Text of the sibling `.m3u`, if one was found.
    pub m3u: Option<String>,
}

pub(crate) struct Engine {
    pub backend: Arc<dyn DecoderBackend>,
    pub options: PlayerOptions,
    pub state: PlaybackState,
    pub files: Vec<LoadedFile>,
    pub file_list: Playlist,
    pub track_list: Playlist,
    pub decoder: Option<Box<dyn Decoder>>,
    pub tracks: Vec<Metadata>,
    pub mutes: [bool; NUM_CHANNELS],
    pub channel_volumes: [u8; NUM_CHANNELS],
    pub events: EventBus,
    pub visualization: Vec<f32>,
    /// Last decoded block, scaled to `[-1, 1]` but not yet by master volume.
    pub pending: Box<[f32; SAMPLES_PER_BLOCK]>,
    /// Samples of `pending` already handed out. `SAMPLES_PER_BLOCK` when empty.
    pub pending_pos: usize,
}

impl Engine {
    pub fn new(backend: Arc<dyn DecoderBackend>, mut options: PlayerOptions) -> Self {
        options.sanitize();
        let mut file_list = Playlist::new();
        file_list.set_repeat(options.file_repeat);
        let mut track_list = Playlist::new();
        track_list.set_repeat(options.track_repeat);
        Self {
            backend,
            options,
            state: PlaybackState::Empty,
            files: Vec::new(),
            file_list,
            track_list,
            decoder: None,
            tracks: Vec::new(),
            mutes: [false; NUM_CHANNELS],
            channel_volumes: [DEFAULT_CHANNEL_VOLUME; NUM_CHANNELS],
            events: EventBus::new(),
            visualization: Vec::with_capacity(FRAMES_PER_BLOCK),
            pending: Box::new([0.0; SAMPLES_PER_BLOCK]),
            pending_pos: SAMPLES_PER_BLOCK,
        }
    }

    pub fn emit(&mut self, event: PlayerEvent<'_>) {
        self.events.emit(&event);
    }

    /// Emit an error event and hand the error back.
    pub fn report(&mut self, err: PlayerError) -> PlayerError {
        log::error!("{err}");
        self.events.emit(&PlayerEvent::Error(&err));
        err
    }

    /// Emit the error of a failed result, if any, and pass the result through.
    pub fn reported<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.report(e))
    }

    fn current_file(&self) -> Option<&LoadedFile> {
        self.file_list.current_id().and_then(|id| self.files.get(id))
    }

    pub fn current_metadata(&self) -> Option<&Metadata> {
        self.track_list.current_id().and_then(|id| self.tracks.get(id))
    }

    /// Attach the current file and track to an error that lacks them.
    pub fn with_context(&self, mut err: PlayerError) -> PlayerError {
        if err.file_path.is_none() {
            err.file_path = self.current_file().map(|f| f.path.clone());
        }
        if err.track_name.is_none() {
            err.track_name = self.current_metadata().map(|m| m.song().to_string());
        }
        err
    }

    /// Append a file whose bytes were already read and probed.
    pub fn push_file(&mut self, file: LoadedFile) {
        log::info!("added {}", file.path.display());
        let active = self.file_list.current_id();
        self.files.push(file);
        self.file_list.regen(Some(self.files.len()));
        self.file_list
            .set_current(active.and_then(|id| self.file_list.position_of(id)));
        self.emit(PlayerEvent::PlaylistChanged(PlaylistKind::File));
    }

    pub fn remove_file(&mut self, pos: usize) -> bool {
        let Some(id) = self.file_list.get(pos) else {
            return false;
        };
        let active = self.file_list.current() == Some(pos);
        let removed = self.files.remove(id);
        self.file_list.remove(pos);
        log::info!("removed {}", removed.path.display());
        if active {
            self.unload();
        }
        self.emit(PlayerEvent::FileRemoved(pos));
        self.emit(PlayerEvent::PlaylistChanged(PlaylistKind::File));
        true
    }

    /// Forget the undelivered rest of the last block.
    pub fn discard_pending(&mut self) {
        self.pending_pos = SAMPLES_PER_BLOCK;
    }

    /// Drop the decoder and the track list.
    fn unload(&mut self) {
        self.discard_pending();
        self.decoder = None;
        self.tracks.clear();
        self.track_list.clear();
        self.state = PlaybackState::Empty;
    }

    pub fn clear(&mut self) {
        self.unload();
        self.files.clear();
        self.file_list.clear();
        self.emit(PlayerEvent::Cleared);
    }

    /// Open the file at playlist position `pos` with a fresh decoder.
    pub fn load_file(&mut self, pos: usize) -> Result<()> {
        let id = self.file_list.get(pos).ok_or_else(|| {
            PlayerError::new(ErrorKind::LoadFile, format!("no file at position {pos}"))
        })?;
        let file = &self.files[id];

        let mut decoder = self.backend.create();
        decoder
            .open(&file.data, SAMPLE_RATE)
            .map_err(|e| PlayerError::from(e).with_file(&file.path))?;

        let mut m3u_error = None;
        if let Some(text) = &file.m3u {
            if let Err(e) = decoder.load_m3u_data(text) {
                m3u_error = Some(PlayerError::from(e).with_file(&file.path));
            }
        }
        log::info!(
            "loaded {} ({} tracks, {} backend)",
            file.path.display(),
            decoder.track_count(),
            self.backend.name()
        );

        for (ch, &muted) in self.mutes.iter().enumerate() {
            decoder.mute_channel(ch, muted);
        }
        for (ch, &volume) in self.channel_volumes.iter().enumerate() {
            decoder.set_channel_volume(ch, channel_gain(volume));
        }
        decoder.set_tempo(self.options.tempo);

        let default_length = self.options.default_duration;
        self.tracks = (0..decoder.track_count())
            .map(|i| {
                let mut m = decoder.track_metadata(i, default_length);
                if m.song().is_empty() {
                    m.set(MetadataField::Song, default_track_name(i));
                }
                m
            })
            .collect();
        self.decoder = Some(decoder);
        self.discard_pending();
        self.track_list.regen(Some(self.tracks.len()));
        self.track_list.set_current(None);
        self.file_list.set_current(Some(pos));

        if let Some(err) = m3u_error {
            log::warn!("ignoring companion m3u: {err}");
            self.events.emit(&PlayerEvent::Error(&err));
        }
        self.emit(PlayerEvent::FileChanged(pos));
        Ok(())
    }

    /// Start the track at playlist position `pos` of the loaded file.
    pub fn load_track(&mut self, pos: usize) -> Result<()> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| PlayerError::new(ErrorKind::LoadTrack, "no file loaded"))?;
        let id = self.track_list.get(pos).ok_or_else(|| {
            PlayerError::new(ErrorKind::LoadTrack, format!("no track at position {pos}"))
        })?;

        if let Err(e) = decoder.start_track(id) {
            let name = self.tracks[id].song().to_string();
            return Err(self.with_context(PlayerError::from(e)).with_track(name));
        }
        self.track_list.set_current(Some(pos));
        self.discard_pending();
        self.apply_fade();
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.set_tempo(self.options.tempo);
        }
        if self.state == PlaybackState::Empty {
            self.state = PlaybackState::Stopped;
        }
        log::debug!("track {pos} selected: {}", self.tracks[id].song());
        self.events.emit(&PlayerEvent::TrackChanged {
            index: pos,
            metadata: &self.tracks[id],
        });
        Ok(())
    }

    pub fn load_pair(&mut self, file: usize, track: usize) -> Result<()> {
        self.load_file(file)?;
        self.load_track(track)
    }

    /// Set the decoder fade so it finishes at the end of the current track.
    pub fn apply_fade(&mut self) {
        let Some(length) = self.current_metadata().map(|m| m.length) else {
            return;
        };
        let fade = self.options.fade_out;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.set_fade(length.saturating_sub(fade), fade);
        }
    }

    fn has_track(&self) -> bool {
        self.decoder.is_some() && self.track_list.current().is_some()
    }

    pub fn start_or_resume(&mut self) {
        if self.state == PlaybackState::Playing || !self.has_track() {
            return;
        }
        self.state = PlaybackState::Playing;
        self.emit(PlayerEvent::Played);
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.emit(PlayerEvent::Paused);
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        if !self.has_track() {
            return Ok(());
        }
        self.state = PlaybackState::Stopped;
        let rewound = self.seek_decoder(0);
        self.emit(PlayerEvent::Stopped);
        self.emit(PlayerEvent::PositionChanged(0));
        rewound
    }

    fn seek_decoder(&mut self, ms: u64) -> Result<()> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(PlayerError::new(ErrorKind::Seek, "no file loaded"));
        };
        if let Err(e) = decoder.seek(ms) {
            return Err(self.with_context(PlayerError::from(e)));
        }
        self.discard_pending();
        self.apply_fade();
        Ok(())
    }

    pub fn seek(&mut self, ms: i64) -> Result<()> {
        if !self.has_track() {
            return Err(PlayerError::new(ErrorKind::Seek, "no track loaded"));
        }
        let length = self.length();
        let target = ms.clamp(0, i64::try_from(length).unwrap_or(i64::MAX)) as u64;
        self.seek_decoder(target)?;
        self.emit(PlayerEvent::Seeked(target));
        self.emit(PlayerEvent::PositionChanged(target));
        Ok(())
    }

    pub fn seek_relative(&mut self, offset: i64) -> Result<()> {
        let position = i64::try_from(self.position()).unwrap_or(i64::MAX);
        self.seek(position.saturating_add(offset))
    }

    pub fn position(&self) -> u64 {
        self.decoder.as_ref().map_or(0, |d| d.position())
    }

    pub fn length(&self) -> u64 {
        self.current_metadata().map_or(0, |m| m.length)
    }

    /// Move to the following (or preceding) track, crossing into the next
    /// file when the track list runs out. Returns `false` when both
    /// playlists are exhausted.
    pub fn advance(&mut self, forward: bool) -> Result<bool> {
        let track = if forward {
            self.track_list.next()
        } else {
            self.track_list.prev()
        };
        if let Some(pos) = track {
            self.load_track(pos)?;
            return Ok(true);
        }

        let file = if forward {
            self.file_list.next()
        } else {
            self.file_list.prev()
        };
        let Some(pos) = file else {
            return Ok(false);
        };
        self.load_file(pos)?;
        let count = self.track_list.len();
        if count == 0 {
            return Err(self.with_context(PlayerError::new(
                ErrorKind::LoadTrack,
                "file has no tracks",
            )));
        }
        self.load_track(if forward { 0 } else { count - 1 })?;
        Ok(true)
    }

    /// Stop after the last track: rewind the current track and report one
    /// `Stopped` followed by the rewound position.
    pub fn stop_at_end(&mut self) {
        log::info!("end of playlist");
        self.state = PlaybackState::Stopped;
        let restart = match (self.decoder.as_mut(), self.track_list.current_id()) {
            (Some(decoder), Some(id)) => decoder.start_track(id),
            _ => Ok(()),
        };
        if let Err(e) = restart {
            let err = self.with_context(PlayerError::from(e));
            self.report(err);
        }
        self.discard_pending();
        self.apply_fade();
        self.emit(PlayerEvent::Stopped);
        self.emit(PlayerEvent::PositionChanged(0));
    }

    /// Navigate after a manual next/prev or a finished track.
    pub fn navigate(&mut self, forward: bool) -> Result<()> {
        match self.advance(forward) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.stop_at_end();
                Ok(())
            }
            Err(err) => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Stopped;
                }
                Err(err)
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.track_list.next().is_some() || self.file_list.next().is_some()
    }

    pub fn has_prev(&self) -> bool {
        self.track_list.prev().is_some() || self.file_list.prev().is_some()
    }

    pub fn playlist_mut(&mut self, which: PlaylistKind) -> &mut Playlist {
        match which {
            PlaylistKind::File => &mut self.file_list,
            PlaylistKind::Track => &mut self.track_list,
        }
    }

    pub fn playlist(&self, which: PlaylistKind) -> &Playlist {
        match which {
            PlaylistKind::File => &self.file_list,
            PlaylistKind::Track => &self.track_list,
        }
    }

    pub fn mute_channel(&mut self, index: usize, mute: bool) {
        let Some(slot) = self.mutes.get_mut(index) else {
            return;
        };
        *slot = mute;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.mute_channel(index, mute);
        }
        let value = if mute { 0 } else { self.channel_volumes[index] };
        self.emit(PlayerEvent::ChannelVolumeChanged { index, value });
    }

    pub fn set_channel_volume(&mut self, index: usize, value: u8) {
        let value = value.min(MAX_VOLUME);
        let Some(slot) = self.channel_volumes.get_mut(index) else {
            return;
        };
        *slot = value;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.set_channel_volume(index, channel_gain(value));
        }
        self.emit(PlayerEvent::ChannelVolumeChanged { index, value });
    }

    pub fn set_fade(&mut self, ms: u64) {
        self.options.fade_out = ms;
        self.apply_fade();
        self.emit(PlayerEvent::FadeChanged(ms));
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        let tempo = if tempo.is_finite() && tempo > 0.0 {
            tempo.clamp(0.25, 4.0)
        } else {
            1.0
        };
        self.options.tempo = tempo;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.set_tempo(tempo);
        }
        self.emit(PlayerEvent::TempoChanged(tempo));
    }

    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        self.options.volume = volume;
        self.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn set_repeat(&mut self, file: bool, track: bool) {
        self.options.file_repeat = file;
        self.options.track_repeat = track;
        self.file_list.set_repeat(file);
        self.track_list.set_repeat(track);
        self.emit(PlayerEvent::RepeatChanged { file, track });
    }

    /// Display names in playlist order: file names or track titles.
    pub fn names(&self, which: PlaylistKind) -> Vec<String> {
        match which {
            PlaylistKind::File => self
                .file_list
                .order()
                .iter()
                .map(|&id| {
                    let path = &self.files[id].path;
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string())
                })
                .collect(),
            PlaylistKind::Track => self
                .track_list
                .order()
                .iter()
                .map(|&id| self.tracks[id].song().to_string())
                .collect(),
        }
    }
}

/// Linear gain of a channel volume, 64 being unity.
pub(crate) fn channel_gain(value: u8) -> f32 {
    f32::from(value) / f32::from(DEFAULT_CHANNEL_VOLUME)
}
