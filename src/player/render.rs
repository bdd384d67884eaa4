//! Real-time render path.
//!
//! Decoders produce fixed blocks; callers may ask for any number of samples.
//! The last decoded block is kept in the engine and drained across calls, so
//! a block is decoded only once every sample of the previous one was handed
//! out.

use super::engine::Engine;
use super::PlaybackState;
use crate::error::PlayerError;
use crate::events::PlayerEvent;
use crate::{CHANNELS, MAX_VOLUME, SAMPLES_PER_BLOCK};

impl Engine {
    /// Fill `out` with interleaved output, decoding blocks as needed.
    pub(crate) fn render(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.state != PlaybackState::Playing || self.decoder.is_none() {
                break;
            }
            if self.pending_pos >= SAMPLES_PER_BLOCK && !self.decode_block() {
                break;
            }

            let gain = f32::from(self.options.volume) / f32::from(MAX_VOLUME);
            let n = (out.len() - written).min(SAMPLES_PER_BLOCK - self.pending_pos);
            let src = &self.pending[self.pending_pos..self.pending_pos + n];
            for (dst, &s) in out[written..written + n].iter_mut().zip(src) {
                *dst = s * gain;
            }
            written += n;
            self.pending_pos += n;

            if self.pending_pos == SAMPLES_PER_BLOCK {
                self.finish_block();
            }
        }
        out[written..].fill(0.0);
    }

    /// Pull the next block from the decoder into the pending buffer.
    /// Returns `false` if playback stopped on a decoder error.
    fn decode_block(&mut self) -> bool {
        let Some(decoder) = self.decoder.as_mut() else {
            return false;
        };
        let failure = match decoder.play() {
            Ok(block) => {
                for (dst, &src) in self.pending.iter_mut().zip(block.iter()) {
                    *dst = f32::from(src) / 32768.0;
                }
                None
            }
            Err(e) => Some(e),
        };
        if let Some(e) = failure {
            self.state = PlaybackState::Stopped;
            let err = self.with_context(PlayerError::from(e));
            self.report(err);
            return false;
        }
        self.pending_pos = 0;

        self.visualization.clear();
        self.visualization.extend(
            self.pending
                .chunks_exact(CHANNELS)
                .map(|f| (f[0] + f[1]) / 2.0),
        );
        self.events.emit(&PlayerEvent::SamplesPlayed {
            samples: &self.pending[..],
            visualization: &self.visualization,
        });
        let position = self.position();
        self.emit(PlayerEvent::PositionChanged(position));
        true
    }

    /// Called once the last sample of a block went out.
    fn finish_block(&mut self) {
        let ended = self.decoder.as_ref().is_some_and(|d| d.track_ended());
        if !ended {
            return;
        }
        log::debug!("track ended at {} ms", self.position());
        self.emit(PlayerEvent::TrackEnded);
        if let Err(err) = self.navigate(true) {
            self.report(err);
        }
    }
}
