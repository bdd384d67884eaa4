//! YM register-dump decoder backend.
//!
//! A YM file holds one song: a stream of PSG register frames played back at
//! the frame rate of the original replay routine (50 Hz on the Atari ST).
//! The decoder feeds those frames into [`Psg`] and renders fixed blocks of
//! stereo samples. Songs loop forever from their loop frame; the player ends
//! them through the fade and the length check.

pub mod parser;

use crate::decoder::m3u::M3uPlaylist;
use crate::decoder::psg::{Psg, ATARI_ST_CLOCK, PSG_CHANNELS};
use crate::decoder::{Decoder, DecoderBackend, SampleBlock};
use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::metadata::{track_length, Metadata, MetadataField, MINUTE_MS};
use crate::{FRAMES_PER_BLOCK, SAMPLES_PER_BLOCK};
pub use parser::{YmFormat, YmSong};

/// Length used when a track carries no length at all.
const FALLBACK_LENGTH: u64 = 3 * MINUTE_MS;

/// Creates [`YmDecoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct YmBackend;

impl DecoderBackend for YmBackend {
    fn name(&self) -> &str {
        "ym"
    }

    fn create(&self) -> Box<dyn Decoder> {
        Box::new(YmDecoder::new())
    }
}

/// Decoder for YM2!, YM3!, YM3b, YM5! and YM6! files.
pub struct YmDecoder {
    song: Option<YmSong>,
    m3u: Option<M3uPlaylist>,
    psg: Psg,
    sample_rate: u32,
    block: Box<SampleBlock>,
    started: bool,
    /// Song position in (fractional) frames.
    frame_pos: f64,
    applied_frame: Option<usize>,
    /// Output frames rendered since the track started.
    rendered: u64,
    tempo: f64,
    fade_from: u64,
    fade_length: u64,
    ended: bool,
    length: u64,
}

impl YmDecoder {
    /// Create an unopened decoder.
    pub fn new() -> Self {
        Self {
            song: None,
            m3u: None,
            psg: Psg::new(ATARI_ST_CLOCK, crate::SAMPLE_RATE),
            sample_rate: crate::SAMPLE_RATE,
            block: Box::new([0; SAMPLES_PER_BLOCK]),
            started: false,
            frame_pos: 0.0,
            applied_frame: None,
            rendered: 0,
            tempo: 1.0,
            fade_from: 0,
            fade_length: 0,
            ended: false,
            length: FALLBACK_LENGTH,
        }
    }

    /// The parsed song, once a file is open.
    pub fn song(&self) -> Option<&YmSong> {
        self.song.as_ref()
    }

    fn frames_per_sample(&self) -> f64 {
        let rate = self.song.as_ref().map_or(50, |s| s.frame_rate);
        f64::from(rate) * self.tempo / f64::from(self.sample_rate)
    }
}

impl Default for YmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an unbounded frame counter onto the song, wrapping to the loop frame.
fn wrap_frame(frame: usize, count: usize, loop_frame: usize) -> usize {
    if frame < count {
        frame
    } else {
        loop_frame + (frame - loop_frame) % (count - loop_frame)
    }
}

/// Fade gain at `pos` ms, and whether the fade has run out.
fn fade_gain(pos: u64, from: u64, length: u64) -> (f32, bool) {
    if length == 0 || pos < from {
        return (1.0, false);
    }
    let t = (pos - from) as f64 / length as f64;
    if t >= 1.0 {
        (0.0, true)
    } else {
        ((-8.0 * t).exp2() as f32, false)
    }
}

impl Decoder for YmDecoder {
    fn open(&mut self, data: &[u8], sample_rate: u32) -> DecodeResult<()> {
        let song = parser::parse(data)?;
        self.sample_rate = sample_rate.max(1);
        self.psg = Psg::new(song.master_clock, self.sample_rate);
        self.song = Some(song);
        self.m3u = None;
        self.started = false;
        self.ended = false;
        Ok(())
    }

    fn load_m3u_data(&mut self, text: &str) -> DecodeResult<()> {
        self.m3u = Some(M3uPlaylist::parse(text)?);
        Ok(())
    }

    fn start_track(&mut self, index: usize) -> DecodeResult<()> {
        if self.song.is_none() {
            return Err(DecodeError::new(DecodeErrorKind::LoadTrack, "no file open"));
        }
        if index >= self.track_count() {
            return Err(DecodeError::new(
                DecodeErrorKind::LoadTrack,
                format!("track {index} out of range"),
            ));
        }
        self.length = self.track_metadata(index, FALLBACK_LENGTH).length;
        self.psg.reset();
        self.frame_pos = 0.0;
        self.applied_frame = None;
        self.rendered = 0;
        self.fade_from = 0;
        self.fade_length = 0;
        self.ended = false;
        self.started = true;
        Ok(())
    }

    fn play(&mut self) -> DecodeResult<&SampleBlock> {
        let step = self.frames_per_sample();
        let song = match (&self.song, self.started) {
            (Some(song), true) => song,
            _ => return Err(DecodeError::new(DecodeErrorKind::Play, "no track started")),
        };
        let count = song.frames.len();

        for out in self.block.chunks_exact_mut(2).take(FRAMES_PER_BLOCK) {
            let frame = wrap_frame(self.frame_pos as usize, count, song.loop_frame);
            if self.applied_frame != Some(frame) {
                self.psg.load_frame(&song.frames[frame]);
                self.applied_frame = Some(frame);
            }

            let (left, right) = self.psg.render_sample();
            let pos = self.rendered * 1000 / u64::from(self.sample_rate);
            let (gain, faded_out) = fade_gain(pos, self.fade_from, self.fade_length);
            self.ended |= faded_out;
            out[0] = (f32::from(left) * gain) as i16;
            out[1] = (f32::from(right) * gain) as i16;

            self.frame_pos += step;
            self.rendered += 1;
        }
        Ok(&*self.block)
    }

    fn seek(&mut self, ms: u64) -> DecodeResult<()> {
        if !self.started {
            return Err(DecodeError::new(DecodeErrorKind::Seek, "no track started"));
        }
        let rate = self.song.as_ref().map_or(50, |s| s.frame_rate);
        self.rendered = ms * u64::from(self.sample_rate) / 1000;
        self.frame_pos = ms as f64 / 1000.0 * f64::from(rate) * self.tempo;
        self.applied_frame = None;
        self.fade_from = 0;
        self.fade_length = 0;
        self.ended = false;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.rendered * 1000 / u64::from(self.sample_rate)
    }

    fn track_count(&self) -> usize {
        usize::from(self.song.is_some())
    }

    fn track_metadata(&self, index: usize, default_length: u64) -> Metadata {
        let Some(song) = self.song.as_ref().filter(|_| index < 1) else {
            return Metadata::with_length(default_length);
        };
        let entry = self.m3u.as_ref().and_then(|m| m.entry_for_track(index));

        let native = entry.and_then(|e| e.length).unwrap_or(song.duration_ms());
        let loop_length = entry.and_then(|e| e.loop_length).unwrap_or(song.loop_ms());
        let title = entry
            .map(|e| e.title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(&song.title);

        Metadata::with_length(track_length(native, song.intro_ms(), loop_length, default_length))
            .with(MetadataField::System, "Atari ST")
            .with(MetadataField::Song, title)
            .with(MetadataField::Author, song.author.as_str())
            .with(MetadataField::Comment, song.comment.as_str())
    }

    fn track_ended(&self) -> bool {
        self.ended || self.position() > self.length + self.fade_length
    }

    fn channel_count(&self) -> usize {
        PSG_CHANNELS
    }

    fn channel_name(&self, index: usize) -> String {
        format!("Channel {}", char::from(b'A' + (index % 26) as u8))
    }

    fn mute_channel(&mut self, index: usize, mute: bool) {
        self.psg.mute_channel(index, mute);
    }

    fn set_fade(&mut self, from: u64, length: u64) {
        self.fade_from = from;
        self.fade_length = length;
    }

    fn set_tempo(&mut self, tempo: f64) {
        if tempo.is_finite() && tempo > 0.0 {
            self.tempo = tempo;
        }
    }

    fn set_channel_volume(&mut self, index: usize, gain: f32) {
        self.psg.set_channel_gain(index, gain);
    }
}
