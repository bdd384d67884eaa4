//! Audio device output using rodio.
//!
//! [`AudioOutput`] hands a clone of the [`Player`] to rodio's mixer thread,
//! which pulls blocks through [`Player::render`] as the device asks for them.

use crate::player::Player;
use crate::{CHANNELS, SAMPLES_PER_BLOCK, SAMPLE_RATE};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Failure to open the audio device.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// No usable output stream.
    #[error("failed to create audio stream: {0}")]
    Stream(#[from] rodio::StreamError),
    /// The stream exists but a sink could not be attached.
    #[error("failed to create audio sink: {0}")]
    Sink(#[from] rodio::PlayError),
}

/// Source that renders the player one block at a time.
struct PlayerSource {
    player: Player,
    finished: Arc<AtomicBool>,
    buffer: Vec<f32>,
    buffer_pos: usize,
}

impl PlayerSource {
    fn new(player: Player, finished: Arc<AtomicBool>) -> Self {
        Self {
            player,
            finished,
            buffer: vec![0.0; SAMPLES_PER_BLOCK],
            buffer_pos: SAMPLES_PER_BLOCK,
        }
    }
}

impl Source for PlayerSource {
    fn current_frame_len(&self) -> Option<usize> {
        let left = self.buffer.len().saturating_sub(self.buffer_pos);
        Some(if left == 0 { SAMPLES_PER_BLOCK } else { left })
    }

    fn channels(&self) -> u16 {
        CHANNELS as u16
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for PlayerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.buffer_pos >= self.buffer.len() {
            // silence while stopped keeps the stream open
            self.player.render(&mut self.buffer);
            self.buffer_pos = 0;
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Output stream playing a [`Player`] on the default device.
pub struct AudioOutput {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open the default device and start pulling audio from `player`.
    ///
    /// The player itself decides whether that audio is silence; pausing the
    /// output only stops the device from asking.
    pub fn new(player: &Player) -> Result<Self, OutputError> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        let finished = Arc::new(AtomicBool::new(false));
        sink.append(PlayerSource::new(player.clone(), Arc::clone(&finished)));
        log::info!("audio output opened at {SAMPLE_RATE} Hz");
        Ok(Self {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Stop pulling from the player.
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume pulling from the player.
    pub fn play(&self) {
        self.sink.play();
    }

    /// Whether the device is currently pulling.
    pub fn is_active(&self) -> bool {
        !self.sink.is_paused() && !self.finished.load(Ordering::Relaxed)
    }

    /// End the stream. The source returns `None` on its next pull.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.finish();
        self.sink.pause();
    }
}

#[cfg(all(test, feature = "ym-backend"))]
mod tests {
    use super::*;
    use crate::config::PlayerOptions;

    fn player() -> Player {
        Player::with_ym_backend(PlayerOptions::default())
    }

    #[test]
    fn source_reports_player_format() {
        let source = PlayerSource::new(player(), Arc::new(AtomicBool::new(false)));
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44_100);
        assert_eq!(source.total_duration(), None);
        assert_eq!(source.current_frame_len(), Some(SAMPLES_PER_BLOCK));
    }

    #[test]
    fn idle_player_yields_silence() {
        let mut source = PlayerSource::new(player(), Arc::new(AtomicBool::new(false)));
        let samples: Vec<f32> = source.by_ref().take(SAMPLES_PER_BLOCK + 10).collect();
        assert_eq!(samples.len(), SAMPLES_PER_BLOCK + 10);
        assert!(samples.iter().all(|&s| s == 0.0));
        assert_eq!(source.current_frame_len(), Some(SAMPLES_PER_BLOCK - 10));
    }

    #[test]
    fn finished_source_ends() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut source = PlayerSource::new(player(), Arc::clone(&finished));
        assert!(source.next().is_some());
        finished.store(true, Ordering::Relaxed);
        assert_eq!(source.next(), None);
    }

    #[test]
    fn device_pause_and_resume() {
        let output = match AudioOutput::new(&player()) {
            Ok(output) => output,
            Err(err) => {
                eprintln!("Skipping audio output test (audio backend unavailable): {err}");
                return;
            }
        };
        assert!(output.is_active());
        output.pause();
        assert!(!output.is_active());
        output.play();
        assert!(output.is_active());
    }
}
