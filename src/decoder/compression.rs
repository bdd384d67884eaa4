//! Transparent LHA decompression.
//!
//! Most YM files in the wild are LH5-compressed archives holding a single
//! member. [`decompress_if_needed`] unpacks such data in memory and passes
//! anything else through.

use crate::error::{DecodeError, DecodeResult};
use std::borrow::Cow;
use std::io::Read;

/// How far into the data the `-lh?-` method id may start. Level 2 headers
/// put it later than level 0 and 1.
const LHA_SEARCH_LIMIT: usize = 40;

const LHA_SIGNATURE_LENGTH: usize = 5;

/// Upper bound on the unpacked size.
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Unpack LHA data, or borrow the input unchanged if it is not compressed.
///
/// Failures are `LoadFile` errors.
pub fn decompress_if_needed(data: &[u8]) -> DecodeResult<Cow<'_, [u8]>> {
    if !is_lha_compressed(data) {
        return Ok(Cow::Borrowed(data));
    }

    let reader = delharc::LhaDecodeReader::new(data)
        .map_err(|e| DecodeError::load_file(format!("failed to parse LHA archive: {e}")))?;

    let mut unpacked = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE as u64)
        .read_to_end(&mut unpacked)
        .map_err(|e| DecodeError::load_file(format!("LHA decompression failed: {e}")))?;

    if unpacked.len() >= MAX_DECOMPRESSED_SIZE {
        return Err(DecodeError::load_file(
            "decompressed data exceeds the 100MB limit",
        ));
    }

    log::debug!("unpacked LHA archive: {} -> {} bytes", data.len(), unpacked.len());
    Ok(Cow::Owned(unpacked))
}

/// Whether the data carries an LHA method id (`-lh0-` to `-lh7-`) near its start.
pub fn is_lha_compressed(data: &[u8]) -> bool {
    find_lha_signature(data).is_some()
}

fn find_lha_signature(data: &[u8]) -> Option<usize> {
    if data.len() < LHA_SIGNATURE_LENGTH + 2 {
        return None;
    }
    let limit = LHA_SEARCH_LIMIT.min(data.len() - LHA_SIGNATURE_LENGTH);
    (1..=limit).find(|&i| {
        matches!(
            &data[i..i + LHA_SIGNATURE_LENGTH],
            [b'-', b'l', b'h', b'0'..=b'7', b'-']
        )
    })
}
