//! YM register-dump parser.
//!
//! Supported layouts:
//! - `YM2!` / `YM3!`: 4-byte magic followed by 14 registers per frame, stored
//!   register-interleaved (all R0 values, then all R1 values, ...).
//! - `YM3b`: like `YM3!` with a little-endian loop frame in the last 4 bytes.
//! - `YM5!` / `YM6!`: 34-byte big-endian header after the magic and the
//!   `LeOnArD!` check string, digidrum samples, three NUL-terminated strings,
//!   16 registers per frame and an `End!` trailer.
//!
//! LHA-compressed input is unpacked first.

use crate::decoder::compression::decompress_if_needed;
use crate::decoder::psg::ATARI_ST_CLOCK;
use crate::error::{DecodeError, DecodeResult};

const YM5_HEADER_SIZE: usize = 34;
const CHECK_STRING: &[u8; 8] = b"LeOnArD!";
const END_MARKER: &[u8; 4] = b"End!";
const ATTR_INTERLEAVED: u32 = 1;

/// Register dump layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmFormat {
    /// Raw interleaved registers, no loop information.
    Ym2,
    /// Same layout as YM2 at a fixed 50 Hz.
    Ym3,
    /// YM3 followed by a loop frame.
    Ym3b,
    /// Header with metadata and digidrums.
    Ym5,
    /// YM5 with extended special effects.
    Ym6,
}

impl YmFormat {
    /// Name of the format as shown to users.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ym2 => "YM2",
            Self::Ym3 => "YM3",
            Self::Ym3b => "YM3b",
            Self::Ym5 => "YM5",
            Self::Ym6 => "YM6",
        }
    }
}

/// A parsed YM file.
#[derive(Debug, Clone)]
pub struct YmSong {
    /// Container revision.
    pub format: YmFormat,
    /// Register frames, always 16 registers wide.
    pub frames: Vec<[u8; 16]>,
    /// PSG clock in Hz.
    pub master_clock: u32,
    /// Frames per second.
    pub frame_rate: u16,
    /// Frame playback returns to after the last one.
    pub loop_frame: usize,
    /// Song title.
    pub title: String,
    /// Composer.
    pub author: String,
    /// Free-form comment.
    pub comment: String,
}

impl YmSong {
    /// Song length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.frames.len(), self.frame_rate)
    }

    /// Length of the part before the loop point, in milliseconds.
    pub fn intro_ms(&self) -> u64 {
        frames_to_ms(self.loop_frame, self.frame_rate)
    }

    /// Length of the looping part, in milliseconds.
    pub fn loop_ms(&self) -> u64 {
        frames_to_ms(self.frames.len() - self.loop_frame, self.frame_rate)
    }
}

fn frames_to_ms(frames: usize, rate: u16) -> u64 {
    frames as u64 * 1000 / u64::from(rate.max(1))
}

/// Parse a (possibly compressed) YM file.
///
/// Unknown magic is a `FileType` error, a malformed body a `Header` error.
pub fn parse(data: &[u8]) -> DecodeResult<YmSong> {
    let data = decompress_if_needed(data)?;
    let data = &*data;
    if data.len() < 4 {
        return Err(DecodeError::file_type("file too small to identify"));
    }
    let song = match &data[0..4] {
        b"YM2!" => parse_ym3(data, YmFormat::Ym2)?,
        b"YM3!" => parse_ym3(data, YmFormat::Ym3)?,
        b"YM3b" => parse_ym3(data, YmFormat::Ym3b)?,
        b"YM5!" => parse_ym5(data, YmFormat::Ym5)?,
        b"YM6!" => parse_ym5(data, YmFormat::Ym6)?,
        magic => {
            return Err(DecodeError::file_type(format!(
                "unknown magic {:?}",
                String::from_utf8_lossy(magic)
            )))
        }
    };
    log::debug!(
        "parsed {} file: {} frames at {} Hz, loop frame {}",
        song.format.name(),
        song.frames.len(),
        song.frame_rate,
        song.loop_frame
    );
    Ok(song)
}

fn parse_ym3(data: &[u8], format: YmFormat) -> DecodeResult<YmSong> {
    let (payload, stored_loop) = if format == YmFormat::Ym3b {
        if data.len() < 8 {
            return Err(DecodeError::header("YM3b file too small for loop frame"));
        }
        let split = data.len() - 4;
        let lp = u32::from_le_bytes([data[split], data[split + 1], data[split + 2], data[split + 3]]);
        (&data[4..split], lp as usize)
    } else {
        (&data[4..], 0)
    };

    if payload.is_empty() || payload.len() % 14 != 0 {
        return Err(DecodeError::header(format!(
            "{} data size {} is not a multiple of 14",
            format.name(),
            payload.len()
        )));
    }

    let count = payload.len() / 14;
    let frames = deinterleave(payload, count, 14);

    Ok(YmSong {
        format,
        loop_frame: checked_loop(stored_loop, count),
        frames,
        master_clock: ATARI_ST_CLOCK,
        frame_rate: 50,
        title: String::new(),
        author: String::new(),
        comment: String::new(),
    })
}

fn parse_ym5(data: &[u8], format: YmFormat) -> DecodeResult<YmSong> {
    let name = format.name();
    if data.len() < YM5_HEADER_SIZE {
        return Err(DecodeError::header(format!("{name} file too small for header")));
    }
    if &data[4..12] != CHECK_STRING {
        return Err(DecodeError::header(format!("{name} check string missing")));
    }

    let mut r = Reader::new(data, 12);
    let frame_count = r.u32()? as usize;
    let attributes = r.u32()?;
    let digidrums = r.u16()?;
    let master_clock = r.u32()?;
    let frame_rate = r.u16()?;
    let loop_frame = r.u32()? as usize;
    let extra = r.u16()?;

    if frame_count == 0 {
        return Err(DecodeError::header(format!("{name} file has no frames")));
    }

    r.skip(usize::from(extra))?;
    for _ in 0..digidrums {
        let size = r.u32()? as usize;
        r.skip(size)?;
    }

    let title = r.nt_string();
    let author = r.nt_string();
    let comment = r.nt_string();

    let size = frame_count
        .checked_mul(16)
        .ok_or_else(|| DecodeError::header("frame count overflow"))?;
    let body = r.take(size)?;
    let frames = if attributes & ATTR_INTERLEAVED != 0 {
        deinterleave(body, frame_count, 16)
    } else {
        body.chunks_exact(16)
            .map(|c| {
                let mut f = [0u8; 16];
                f.copy_from_slice(c);
                f
            })
            .collect()
    };

    if r.take(4).map_or(true, |m| m != END_MARKER) {
        return Err(DecodeError::header(format!("{name} end marker missing")));
    }

    Ok(YmSong {
        format,
        loop_frame: checked_loop(loop_frame, frame_count),
        frames,
        master_clock: if master_clock == 0 { ATARI_ST_CLOCK } else { master_clock },
        frame_rate: if frame_rate == 0 { 50 } else { frame_rate },
        title,
        author,
        comment,
    })
}

fn checked_loop(loop_frame: usize, count: usize) -> usize {
    if loop_frame < count {
        loop_frame
    } else {
        log::warn!("loop frame {loop_frame} outside {count} frames, looping from start");
        0
    }
}

/// Convert register-major storage into frame-major 16-register frames.
fn deinterleave(body: &[u8], count: usize, registers: usize) -> Vec<[u8; 16]> {
    (0..count)
        .map(|frame| {
            let mut f = [0u8; 16];
            for (reg, slot) in f.iter_mut().enumerate().take(registers) {
                *slot = body[reg * count + frame];
            }
            f
        })
        .collect()
}

/// Bounds-checked big-endian cursor.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| DecodeError::header("unexpected end of file"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> DecodeResult<()> {
        self.take(n).map(|_| ())
    }

    fn u16(&mut self) -> DecodeResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> DecodeResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// NUL-terminated Latin-1 string; an unterminated string runs to the end.
    fn nt_string(&mut self) -> String {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let s = rest[..len].iter().map(|&b| b as char).collect();
        self.pos = (self.pos + len + 1).min(self.data.len());
        s
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;

    /// Build a YM6 file with `frames` non-interleaved frames.
    pub(crate) fn ym6(frames: &[[u8; 16]], loop_frame: u32, interleaved: bool) -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(b"YM6!");
        d.extend_from_slice(CHECK_STRING);
        d.extend_from_slice(&(frames.len() as u32).to_be_bytes());
        d.extend_from_slice(&u32::from(interleaved).to_be_bytes());
        d.extend_from_slice(&1u16.to_be_bytes()); // one digidrum
        d.extend_from_slice(&ATARI_ST_CLOCK.to_be_bytes());
        d.extend_from_slice(&50u16.to_be_bytes());
        d.extend_from_slice(&loop_frame.to_be_bytes());
        d.extend_from_slice(&0u16.to_be_bytes());
        d.extend_from_slice(&3u32.to_be_bytes());
        d.extend_from_slice(&[1, 2, 3]);
        d.extend_from_slice(b"Test Song\0Test Author\0Comment\0");
        if interleaved {
            for reg in 0..16 {
                d.extend(frames.iter().map(|f| f[reg]));
            }
        } else {
            for f in frames {
                d.extend_from_slice(f);
            }
        }
        d.extend_from_slice(END_MARKER);
        d
    }

    fn numbered_frames(count: usize) -> Vec<[u8; 16]> {
        (0..count)
            .map(|i| {
                let mut f = [0u8; 16];
                for (r, v) in f.iter_mut().enumerate() {
                    *v = (i * 16 + r) as u8;
                }
                f
            })
            .collect()
    }

    #[test]
    fn ym6_header_and_strings() {
        let song = parse(&ym6(&numbered_frames(100), 25, false)).unwrap();
        assert_eq!(song.format, YmFormat::Ym6);
        assert_eq!(song.frames.len(), 100);
        assert_eq!(song.frame_rate, 50);
        assert_eq!(song.loop_frame, 25);
        assert_eq!(song.title, "Test Song");
        assert_eq!(song.author, "Test Author");
        assert_eq!(song.comment, "Comment");
        assert_eq!(song.duration_ms(), 2000);
        assert_eq!(song.intro_ms(), 500);
        assert_eq!(song.loop_ms(), 1500);
    }

    #[test]
    fn ym6_interleaved_matches_sequential() {
        let frames = numbered_frames(7);
        let a = parse(&ym6(&frames, 0, true)).unwrap();
        let b = parse(&ym6(&frames, 0, false)).unwrap();
        assert_eq!(a.frames, frames);
        assert_eq!(b.frames, frames);
    }

    #[test]
    fn ym3_deinterleaves_fourteen_registers() {
        let mut d = b"YM3!".to_vec();
        // two frames: R0 = [10, 11], R1 = [20, 21], ...
        for reg in 0..14u8 {
            d.push(reg * 10 + 10);
            d.push(reg * 10 + 11);
        }
        let song = parse(&d).unwrap();
        assert_eq!(song.frames.len(), 2);
        assert_eq!(song.frames[0][0], 10);
        assert_eq!(song.frames[1][0], 11);
        assert_eq!(song.frames[1][13], 141);
        assert_eq!(song.frames[0][14], 0);
        assert_eq!(song.loop_frame, 0);
    }

    #[test]
    fn ym3b_reads_little_endian_loop() {
        let mut d = b"YM3b".to_vec();
        d.extend(std::iter::repeat(0u8).take(14 * 4));
        d.extend_from_slice(&2u32.to_le_bytes());
        let song = parse(&d).unwrap();
        assert_eq!(song.format, YmFormat::Ym3b);
        assert_eq!(song.loop_frame, 2);
    }

    #[test]
    fn out_of_range_loop_falls_back_to_start() {
        let song = parse(&ym6(&numbered_frames(4), 9, false)).unwrap();
        assert_eq!(song.loop_frame, 0);
    }

    #[test]
    fn unknown_magic_is_file_type_error() {
        assert_eq!(parse(b"RIFF....").unwrap_err().kind, DecodeErrorKind::FileType);
        assert_eq!(parse(b"YM").unwrap_err().kind, DecodeErrorKind::FileType);
    }

    #[test]
    fn broken_bodies_are_header_errors() {
        let mut bad_check = ym6(&numbered_frames(3), 0, false);
        bad_check[4] = b'X';
        assert_eq!(parse(&bad_check).unwrap_err().kind, DecodeErrorKind::Header);

        let mut truncated = ym6(&numbered_frames(3), 0, false);
        truncated.truncate(truncated.len() - 10);
        assert_eq!(parse(&truncated).unwrap_err().kind, DecodeErrorKind::Header);

        let mut no_end = ym6(&numbered_frames(3), 0, false);
        let n = no_end.len();
        no_end[n - 1] = b'?';
        assert_eq!(parse(&no_end).unwrap_err().kind, DecodeErrorKind::Header);

        let ragged = b"YM3!\x01\x02\x03".to_vec();
        assert_eq!(parse(&ragged).unwrap_err().kind, DecodeErrorKind::Header);
    }
}
