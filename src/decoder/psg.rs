//! Compact YM2149 PSG synthesizer.
//!
//! Emulates the three square-wave tone channels, the 17-bit noise LFSR and
//! the 32-step envelope generator, clocked at master clock / 8. Output is
//! downsampled by averaging every internal tick that falls into one output
//! sample, then spread to stereo (A left, B centre, C right) and DC-blocked.

use std::sync::OnceLock;

/// Number of tone channels.
pub const PSG_CHANNELS: usize = 3;

/// Atari ST master clock.
pub const ATARI_ST_CLOCK: u32 = 2_000_000;

// Left/right weights per channel.
const PAN: [(f32, f32); PSG_CHANNELS] = [(0.8, 0.2), (0.5, 0.5), (0.2, 0.8)];

const OUTPUT_SCALE: f32 = 32767.0 / 1.5;

/// 32-entry logarithmic DAC table (1.5 dB per step), level 0 silent.
fn volume_table() -> &'static [f32; 32] {
    static TABLE: OnceLock<[f32; 32]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 32];
        for (level, v) in table.iter_mut().enumerate().skip(1) {
            *v = 10f32.powf((level as f32 - 31.0) * 1.5 / 20.0);
        }
        table
    })
}

#[derive(Clone, Debug, Default)]
struct ToneGenerator {
    counter: u32,
    period: u32,
    high: bool,
}

impl ToneGenerator {
    #[inline]
    fn tick(&mut self) {
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            self.high = !self.high;
        }
    }
}

/// Galois LFSR with taps at bits 13 and 16, stepped at half the tone rate.
#[derive(Clone, Debug)]
struct NoiseGenerator {
    counter: u32,
    period: u32,
    lfsr: u32,
    high: bool,
    half_tick: bool,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self {
            counter: 0,
            period: 0,
            lfsr: 1,
            high: false,
            half_tick: false,
        }
    }
}

impl NoiseGenerator {
    #[inline]
    fn tick(&mut self) {
        self.half_tick = !self.half_tick;
        if !self.half_tick {
            return;
        }
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            let lsb = self.lfsr & 1;
            self.lfsr >>= 1;
            if lsb != 0 {
                self.lfsr ^= 0x12000;
            }
            self.high = lsb != 0;
        }
    }
}

/// Envelope generator. Register 13 bits: 3 continue, 2 attack, 1 alternate,
/// 0 hold.
#[derive(Clone, Debug, Default)]
struct EnvelopeGenerator {
    counter: u32,
    period: u32,
    shape: u8,
    step: u8,
    attack: bool,
    holding: bool,
    level: u8,
}

impl EnvelopeGenerator {
    fn set_shape(&mut self, shape: u8) {
        self.shape = shape & 0x0f;
        self.attack = self.shape & 0x04 != 0;
        self.step = 0;
        self.counter = 0;
        self.holding = false;
        self.level = if self.attack { 0 } else { 31 };
    }

    #[inline]
    fn tick(&mut self) {
        if self.holding {
            return;
        }
        self.counter += 1;
        if self.counter < self.period.max(1) {
            return;
        }
        self.counter = 0;
        self.step += 1;
        if self.step < 32 {
            self.level = if self.attack { self.step } else { 31 - self.step };
        } else {
            self.end_cycle();
        }
    }

    fn end_cycle(&mut self) {
        let cont = self.shape & 0x08 != 0;
        let alternate = self.shape & 0x02 != 0;
        let hold = self.shape & 0x01 != 0;

        if !cont {
            self.holding = true;
            self.level = 0;
        } else if hold {
            self.holding = true;
            // last value of the cycle, or its opposite when alternating
            self.level = if self.attack != alternate { 31 } else { 0 };
        } else {
            if alternate {
                self.attack = !self.attack;
            }
            self.step = 0;
            self.level = if self.attack { 0 } else { 31 };
        }
    }
}

/// Running-average DC blocker over the last 2048 samples.
#[derive(Clone)]
struct DcFilter {
    history: Box<[f32; DC_HISTORY]>,
    position: usize,
    sum: f32,
}

const DC_HISTORY: usize = 2048;

impl DcFilter {
    fn new() -> Self {
        Self {
            history: Box::new([0.0; DC_HISTORY]),
            position: 0,
            sum: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, sample: f32) -> f32 {
        self.sum += sample - self.history[self.position];
        self.history[self.position] = sample;
        self.position = (self.position + 1) % DC_HISTORY;
        sample - self.sum / DC_HISTORY as f32
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.position = 0;
        self.sum = 0.0;
    }
}

/// YM2149 register-level synthesizer.
#[derive(Clone)]
pub struct Psg {
    registers: [u8; 16],
    tones: [ToneGenerator; PSG_CHANNELS],
    noise: NoiseGenerator,
    envelope: EnvelopeGenerator,
    ticks_per_sample: f64,
    tick_phase: f64,
    gains: [f32; PSG_CHANNELS],
    muted: [bool; PSG_CHANNELS],
    dc: [DcFilter; 2],
}

impl Psg {
    /// Create a chip clocked at `master_clock` Hz producing `sample_rate` Hz output.
    pub fn new(master_clock: u32, sample_rate: u32) -> Self {
        let mut psg = Self {
            registers: [0; 16],
            tones: Default::default(),
            noise: NoiseGenerator::default(),
            envelope: EnvelopeGenerator::default(),
            ticks_per_sample: 1.0,
            tick_phase: 0.0,
            gains: [1.0; PSG_CHANNELS],
            muted: [false; PSG_CHANNELS],
            dc: [DcFilter::new(), DcFilter::new()],
        };
        psg.set_clock(master_clock, sample_rate);
        psg.reset();
        psg
    }

    /// Change the chip clock or output rate, keeping register state.
    pub fn set_clock(&mut self, master_clock: u32, sample_rate: u32) {
        self.ticks_per_sample = f64::from(master_clock) / 8.0 / f64::from(sample_rate.max(1));
    }

    /// Silence the chip. Register 7 is set to disable every tone and noise source.
    pub fn reset(&mut self) {
        self.registers = [0; 16];
        self.registers[7] = 0x3f;
        self.tones = Default::default();
        self.noise = NoiseGenerator::default();
        self.envelope = EnvelopeGenerator::default();
        self.tick_phase = 0.0;
        for dc in &mut self.dc {
            dc.reset();
        }
    }

    /// Current value of a register.
    pub fn register(&self, index: usize) -> u8 {
        self.registers[index & 0x0f]
    }

    /// Write one register. Writing register 13 restarts the envelope.
    pub fn write_register(&mut self, index: usize, value: u8) {
        let index = index & 0x0f;
        self.registers[index] = value;
        match index {
            0..=5 => {
                let ch = index / 2;
                self.tones[ch].period = u32::from(self.registers[ch * 2])
                    | (u32::from(self.registers[ch * 2 + 1] & 0x0f) << 8);
            }
            6 => self.noise.period = u32::from(value & 0x1f),
            11 | 12 => {
                self.envelope.period =
                    u32::from(self.registers[11]) | (u32::from(self.registers[12]) << 8);
            }
            13 => self.envelope.set_shape(value),
            _ => {}
        }
    }

    /// Apply one frame of a register dump. A register 13 value of `0xff`
    /// leaves the envelope running.
    pub fn load_frame(&mut self, frame: &[u8; 16]) {
        for (index, &value) in frame.iter().enumerate().take(13) {
            self.write_register(index, value);
        }
        if frame[13] != 0xff {
            self.write_register(13, frame[13]);
        }
    }

    /// Silence one of the three channels.
    pub fn mute_channel(&mut self, index: usize, mute: bool) {
        if let Some(m) = self.muted.get_mut(index) {
            *m = mute;
        }
    }

    /// Linear gain of one channel.
    pub fn set_channel_gain(&mut self, index: usize, gain: f32) {
        if let Some(g) = self.gains.get_mut(index) {
            *g = gain.max(0.0);
        }
    }

    fn channel_levels(&self) -> [f32; PSG_CHANNELS] {
        let table = volume_table();
        let mixer = self.registers[7];
        let mut out = [0.0; PSG_CHANNELS];
        for (ch, level) in out.iter_mut().enumerate() {
            let tone_off = mixer & (1 << ch) != 0;
            let noise_off = mixer & (8 << ch) != 0;
            let gate = (self.tones[ch].high || tone_off) && (self.noise.high || noise_off);
            if !gate {
                continue;
            }
            let amp = self.registers[8 + ch];
            let dac = if amp & 0x10 != 0 {
                self.envelope.level as usize
            } else {
                // fixed volumes sit on the odd envelope steps
                ((amp & 0x0f) as usize) * 2 + 1
            };
            // a fixed volume of 0 is silent
            if amp & 0x1f != 0 {
                *level = table[dac];
            }
        }
        out
    }

    /// Produce one stereo output sample.
    pub fn render_sample(&mut self) -> (i16, i16) {
        self.tick_phase += self.ticks_per_sample;
        let ticks = self.tick_phase as u32;
        self.tick_phase -= f64::from(ticks);

        let mut acc = [0.0f32; PSG_CHANNELS];
        for _ in 0..ticks {
            for tone in &mut self.tones {
                tone.tick();
            }
            self.noise.tick();
            self.envelope.tick();
            let levels = self.channel_levels();
            for (a, l) in acc.iter_mut().zip(levels) {
                *a += l;
            }
        }
        if ticks > 0 {
            let n = ticks as f32;
            for a in &mut acc {
                *a /= n;
            }
        } else {
            acc = self.channel_levels();
        }

        let (mut left, mut right) = (0.0, 0.0);
        for ch in 0..PSG_CHANNELS {
            if self.muted[ch] {
                continue;
            }
            let v = acc[ch] * self.gains[ch];
            left += v * PAN[ch].0;
            right += v * PAN[ch].1;
        }
        let left = self.dc[0].process(left) * OUTPUT_SCALE;
        let right = self.dc[1].process(right) * OUTPUT_SCALE;
        (to_i16(left), to_i16(right))
    }
}

#[inline]
fn to_i16(v: f32) -> i16 {
    v.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

impl std::fmt::Debug for Psg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Psg")
            .field("registers", &self.registers)
            .field("ticks_per_sample", &self.ticks_per_sample)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_frame(period: u16, volume: u8) -> [u8; 16] {
        let mut f = [0u8; 16];
        f[0] = (period & 0xff) as u8;
        f[1] = (period >> 8) as u8;
        f[7] = 0x3e; // tone A only
        f[8] = volume;
        f[13] = 0xff;
        f
    }

    fn peak(psg: &mut Psg, samples: usize) -> i32 {
        (0..samples)
            .map(|_| {
                let (l, r) = psg.render_sample();
                i32::from(l).abs().max(i32::from(r).abs())
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn reset_chip_is_silent() {
        let mut psg = Psg::new(ATARI_ST_CLOCK, 44_100);
        assert_eq!(peak(&mut psg, 4096), 0);
    }

    #[test]
    fn tone_channel_produces_sound() {
        let mut psg = Psg::new(ATARI_ST_CLOCK, 44_100);
        psg.load_frame(&tone_frame(284, 15)); // ~440 Hz
        assert!(peak(&mut psg, 4096) > 1000);
    }

    #[test]
    fn muted_channel_is_silent() {
        let mut psg = Psg::new(ATARI_ST_CLOCK, 44_100);
        psg.load_frame(&tone_frame(284, 15));
        psg.mute_channel(0, true);
        assert_eq!(peak(&mut psg, 4096), 0);
    }

    #[test]
    fn channel_a_is_panned_left() {
        let mut psg = Psg::new(ATARI_ST_CLOCK, 44_100);
        psg.load_frame(&tone_frame(284, 15));
        let (mut l, mut r) = (0i64, 0i64);
        for _ in 0..8192 {
            let (a, b) = psg.render_sample();
            l += i64::from(a).abs();
            r += i64::from(b).abs();
        }
        assert!(l > r * 2, "left {l} right {r}");
    }

    #[test]
    fn volume_table_is_monotonic() {
        let t = volume_table();
        assert_eq!(t[0], 0.0);
        assert!((t[31] - 1.0).abs() < 1e-6);
        assert!(t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn envelope_decay_then_hold_low() {
        // shape 0: \___
        let mut env = EnvelopeGenerator {
            period: 1,
            ..Default::default()
        };
        env.set_shape(0x00);
        assert_eq!(env.level, 31);
        for _ in 0..40 {
            env.tick();
        }
        assert!(env.holding);
        assert_eq!(env.level, 0);
    }

    #[test]
    fn envelope_hold_shapes() {
        // (shape, level after the first cycle)
        for (shape, expected) in [(0x0b, 31), (0x0d, 31), (0x0f, 0), (0x09, 0)] {
            let mut env = EnvelopeGenerator {
                period: 1,
                ..Default::default()
            };
            env.set_shape(shape);
            for _ in 0..64 {
                env.tick();
            }
            assert!(env.holding, "shape {shape:#x}");
            assert_eq!(env.level, expected, "shape {shape:#x}");
        }
    }

    #[test]
    fn envelope_triangle_alternates() {
        let mut env = EnvelopeGenerator {
            period: 1,
            ..Default::default()
        };
        env.set_shape(0x0e);
        for _ in 0..31 {
            env.tick();
        }
        assert_eq!(env.level, 31);
        env.tick();
        assert!(!env.attack);
        assert_eq!(env.level, 31);
        for _ in 0..31 {
            env.tick();
        }
        assert_eq!(env.level, 0);
        assert!(!env.holding);
    }

    #[test]
    fn noise_lfsr_never_sticks_at_zero() {
        let mut n = NoiseGenerator {
            period: 1,
            ..Default::default()
        };
        for _ in 0..100_000 {
            n.tick();
            assert_ne!(n.lfsr, 0);
        }
    }
}
