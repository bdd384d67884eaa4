//! Track metadata and display helpers.
//!
//! Besides the [`Metadata`] container this module hosts the small pieces of
//! arithmetic the player and the UI share: the fallback length rule for tracks
//! without native length data, the status-line formatter and the mapping
//! between a tempo multiplier and its integer slider position.

use std::fmt;

/// One second in milliseconds.
pub const SECOND_MS: u64 = 1_000;

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60 * SECOND_MS;

/// Display fields of a track, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    /// Hardware or system the music was written for.
    System = 0,
    /// Game title.
    Game,
    /// Song title.
    Song,
    /// Composer.
    Author,
    /// Copyright string.
    Copyright,
    /// Free-form comment.
    Comment,
    /// Person who ripped the file.
    Dumper,
}

impl MetadataField {
    /// All fields in storage order.
    pub const ALL: [MetadataField; 7] = [
        MetadataField::System,
        MetadataField::Game,
        MetadataField::Song,
        MetadataField::Author,
        MetadataField::Copyright,
        MetadataField::Comment,
        MetadataField::Dumper,
    ];
}

/// Metadata of a single track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Track length in milliseconds. May be a fallback value (see [`track_length`]).
    pub length: u64,
    /// Display strings indexed by [`MetadataField`].
    pub info: [String; 7],
}

impl Metadata {
    /// Create metadata with the given length and empty strings.
    pub fn with_length(length: u64) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// Get one display field.
    pub fn get(&self, field: MetadataField) -> &str {
        &self.info[field as usize]
    }

    /// Set one display field.
    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        self.info[field as usize] = value.into();
    }

    /// Builder-style variant of [`Metadata::set`].
    pub fn with(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Song title.
    pub fn song(&self) -> &str {
        self.get(MetadataField::Song)
    }

    /// Composer.
    pub fn author(&self) -> &str {
        self.get(MetadataField::Author)
    }

    /// Game title.
    pub fn game(&self) -> &str {
        self.get(MetadataField::Game)
    }

    /// System name.
    pub fn system(&self) -> &str {
        self.get(MetadataField::System)
    }
}

/// Name shown for a track whose song field is empty (`index` is 0-based).
pub fn default_track_name(index: usize) -> String {
    format!("Track {}", index + 1)
}

/// Compute the playable length of a track.
///
/// Native length wins when present. Otherwise a looping track plays its intro
/// followed by the loop twice, and anything else gets `default_length`.
pub fn track_length(native: u64, intro: u64, loop_length: u64, default_length: u64) -> u64 {
    if native > 0 {
        native
    } else if loop_length > 0 {
        intro + loop_length * 2
    } else {
        default_length
    }
}

/// Expand a status format string against a track's metadata.
///
/// Directives: `%s` song, `%a` author, `%g` game, `%b` system, `%c` comment,
/// `%d` dumper, `%l` length in milliseconds. Unknown directives expand to
/// nothing. A `%` at the very end of the input is copied as-is.
pub fn format_metadata(fmt: &str, m: &Metadata) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push_str(m.get(MetadataField::Song)),
            Some('a') => out.push_str(m.get(MetadataField::Author)),
            Some('g') => out.push_str(m.get(MetadataField::Game)),
            Some('b') => out.push_str(m.get(MetadataField::System)),
            Some('c') => out.push_str(m.get(MetadataField::Comment)),
            Some('d') => out.push_str(m.get(MetadataField::Dumper)),
            Some('l') => out.push_str(&m.length.to_string()),
            Some(_) => {}
            None => out.push('%'),
        }
    }
    out
}

/// Linear map of `x` from `[in_min, in_max]` onto `[out_min, out_max]`.
pub fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Slider position (0..=100) of a tempo multiplier. 50 is normal speed,
/// 0 is a quarter and 100 four times as fast.
pub fn tempo_to_int(value: f64) -> i32 {
    map_range(value.log2(), -2.0, 2.0, 0.0, 100.0).round() as i32
}

/// Tempo multiplier of a slider position (inverse of [`tempo_to_int`]).
pub fn int_to_tempo(value: i32) -> f64 {
    map_range(f64::from(value), 0.0, 100.0, -2.0, 2.0).exp2()
}

/// Convert a millisecond offset to a count of interleaved samples.
pub fn millis_to_samples(millis: u64, sample_rate: u32, channels: u16) -> u64 {
    let secs = millis / 1000;
    let frac = millis % 1000;
    (secs * u64::from(sample_rate) + frac * u64::from(sample_rate) / 1000) * u64::from(channels)
}

/// Convert a count of interleaved samples to milliseconds.
pub fn samples_to_millis(samples: u64, sample_rate: u32, channels: u16) -> u64 {
    let rate = u64::from(sample_rate) * u64::from(channels);
    let secs = samples / rate;
    let frac = samples % rate;
    secs * 1000 + frac * 1000 / rate
}

/// `mm:ss` rendering of a millisecond duration.
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0 / SECOND_MS;
        write!(f, "{:02}:{:02}", total / 60, total % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Metadata {
        Metadata::with_length(90_000)
            .with(MetadataField::Song, "Lost Woods")
            .with(MetadataField::Author, "Koji Kondo")
            .with(MetadataField::System, "Nintendo")
            .with(MetadataField::Game, "Zelda")
    }

    #[test]
    fn fallback_length_uses_loop_twice() {
        assert_eq!(track_length(0, 1000, 5000, 3 * MINUTE_MS), 11_000);
    }

    #[test]
    fn native_length_wins() {
        assert_eq!(track_length(42_000, 1000, 5000, 3 * MINUTE_MS), 42_000);
    }

    #[test]
    fn default_length_without_loop() {
        assert_eq!(track_length(0, 1000, 0, 3 * MINUTE_MS), 180_000);
    }

    #[test]
    fn format_song_author_system() {
        assert_eq!(
            format_metadata("%s - %a (%b)", &sample()),
            "Lost Woods - Koji Kondo (Nintendo)"
        );
    }

    #[test]
    fn unknown_directive_is_empty() {
        assert_eq!(format_metadata("[%z]", &sample()), "[]");
    }

    #[test]
    fn trailing_percent_is_literal() {
        assert_eq!(format_metadata("%g 100%", &sample()), "Zelda 100%");
        assert_eq!(format_metadata("%", &sample()), "%");
    }

    #[test]
    fn length_directive() {
        assert_eq!(format_metadata("%l", &sample()), "90000");
    }

    #[test]
    fn tempo_mapping_midpoint_and_ends() {
        assert_eq!(tempo_to_int(1.0), 50);
        assert_eq!(tempo_to_int(0.25), 0);
        assert_eq!(tempo_to_int(4.0), 100);
        assert_relative_eq!(int_to_tempo(50), 1.0);
    }

    #[test]
    fn tempo_round_trip_within_slider_resolution() {
        let mut x = 0.25;
        while x <= 4.0 {
            let back = int_to_tempo(tempo_to_int(x));
            // one slider step is 0.04 octaves, half a step is the worst case
            assert_relative_eq!(back, x, max_relative = 0.015);
            x *= 1.07;
        }
    }

    #[test]
    fn sample_time_conversions() {
        assert_eq!(millis_to_samples(1500, 44_100, 2), 132_300);
        assert_eq!(samples_to_millis(132_300, 44_100, 2), 1500);
    }

    #[test]
    fn timestamp_display() {
        assert_eq!(Timestamp(125_400).to_string(), "02:05");
    }

    #[test]
    fn default_track_name_is_one_based() {
        assert_eq!(default_track_name(0), "Track 1");
    }
}
