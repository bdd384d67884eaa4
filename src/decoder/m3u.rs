//! Companion m3u playlists.
//!
//! Game music rips often ship a `<name>.m3u` next to the music file that
//! names the tracks and gives their lengths. Each non-comment line reads
//!
//! ```text
//! file::type,track,title,time,loop,fade
//! ```
//!
//! where `track` is 1-based (a `$` prefix marks it hexadecimal) and the
//! three times use `[[h:]m:]s[.fraction]`. Only `file`, `type` and `track`
//! are required. Commas inside the title are escaped as `\,`.

use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};

/// One parsed m3u line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct M3uEntry {
    /// File name the entry refers to.
    pub file: String,
    /// Format tag such as `NSF` or `YM`.
    pub kind: String,
    /// 0-based track index.
    pub track: usize,
    /// Track title, empty when not given.
    pub title: String,
    /// Track length in milliseconds.
    pub length: Option<u64>,
    /// Loop length in milliseconds.
    pub loop_length: Option<u64>,
    /// Suggested fade length in milliseconds.
    pub fade: Option<u64>,
}

/// Parsed m3u file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct M3uPlaylist {
    entries: Vec<M3uEntry>,
}

impl M3uPlaylist {
    /// Parse m3u text. Malformed lines are skipped; text without a single
    /// usable entry is a `LoadM3u` error.
    pub fn parse(text: &str) -> DecodeResult<Self> {
        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(entry) => entries.push(entry),
                None => log::debug!("m3u line {} skipped: {line}", number + 1),
            }
        }
        if entries.is_empty() {
            return Err(DecodeError::new(
                DecodeErrorKind::LoadM3u,
                "no valid entries in m3u file",
            ));
        }
        Ok(Self { entries })
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[M3uEntry] {
        &self.entries
    }

    /// First entry describing the given 0-based track.
    pub fn entry_for_track(&self, track: usize) -> Option<&M3uEntry> {
        self.entries.iter().find(|e| e.track == track)
    }
}

fn parse_line(line: &str) -> Option<M3uEntry> {
    let (file, rest) = line.split_once("::")?;
    let fields = split_fields(rest);
    let kind = fields.first()?.trim().to_string();
    let track = parse_track(fields.get(1)?.trim())?;
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

    Some(M3uEntry {
        file: file.trim().to_string(),
        kind,
        track,
        title: field(2).to_string(),
        length: parse_time(field(3)),
        loop_length: parse_time(field(4)),
        fade: parse_time(field(5)),
    })
}

fn split_fields(rest: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_track(s: &str) -> Option<usize> {
    let number = match s.strip_prefix('$') {
        Some(hex) => usize::from_str_radix(hex, 16).ok()?,
        None => s.parse().ok()?,
    };
    number.checked_sub(1)
}

/// Parse `[[h:]m:]s[.fraction]` into milliseconds. Empty or malformed input
/// yields `None`.
pub fn parse_time(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut seconds: u64 = 0;
    for part in &parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(part.parse().ok()?)?;
    }

    let mut millis = seconds.checked_mul(1000)?;
    if let Some(f) = fraction {
        if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // first three digits are the millisecond part
        let digits: String = f.chars().chain("000".chars()).take(3).collect();
        millis += digits.parse::<u64>().ok()?;
    }
    Some(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_line() {
        let m3u = M3uPlaylist::parse("game.nsf::NSF,2,Boss Theme,1:30,45,8").unwrap();
        let e = &m3u.entries()[0];
        assert_eq!(e.file, "game.nsf");
        assert_eq!(e.kind, "NSF");
        assert_eq!(e.track, 1);
        assert_eq!(e.title, "Boss Theme");
        assert_eq!(e.length, Some(90_000));
        assert_eq!(e.loop_length, Some(45_000));
        assert_eq!(e.fade, Some(8_000));
    }

    #[test]
    fn optional_fields_and_comments() {
        let text = "# Game rip\n\nsong.ym::YM,1\nsong.ym::YM,$0A,Ending\n";
        let m3u = M3uPlaylist::parse(text).unwrap();
        assert_eq!(m3u.entries().len(), 2);
        assert_eq!(m3u.entries()[0].title, "");
        assert_eq!(m3u.entries()[0].length, None);
        assert_eq!(m3u.entry_for_track(9).map(|e| e.title.as_str()), Some("Ending"));
    }

    #[test]
    fn escaped_comma_in_title() {
        let m3u = M3uPlaylist::parse(r"a.ym::YM,1,Hello\, World,0:05").unwrap();
        assert_eq!(m3u.entries()[0].title, "Hello, World");
        assert_eq!(m3u.entries()[0].length, Some(5_000));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "not an entry\nx.ym::YM,zero\nx.ym::YM,0\nx.ym::YM,3,Ok";
        let m3u = M3uPlaylist::parse(text).unwrap();
        assert_eq!(m3u.entries().len(), 1);
        assert_eq!(m3u.entries()[0].track, 2);
    }

    #[test]
    fn no_entries_is_load_m3u_error() {
        let err = M3uPlaylist::parse("# only a comment\n").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::LoadM3u);
    }

    #[test]
    fn time_formats() {
        assert_eq!(parse_time("5"), Some(5_000));
        assert_eq!(parse_time("2:05"), Some(125_000));
        assert_eq!(parse_time("1:00:00"), Some(3_600_000));
        assert_eq!(parse_time("0:01.5"), Some(1_500));
        assert_eq!(parse_time("0:01.250"), Some(1_250));
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("-"), None);
        assert_eq!(parse_time("1:2:3:4"), None);
        assert_eq!(parse_time("1:"), None);
    }
}
