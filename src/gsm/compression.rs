// ABOUTME: Literal/back-reference compression for EMS compressed data (3GPP TS 23.042 style)
// ABOUTME: Greedy longest-match search over a 511 octet window with 127 octet literal runs

use thiserror::Error;

/// Largest backward distance a slice descriptor can address
pub const MAX_WINDOW: usize = 511;

/// Longest slice a descriptor can describe
pub const MAX_SLICE: usize = 63;

/// Shortest slice worth a 2 octet descriptor
pub const MIN_SLICE: usize = 3;

/// Longest literal run a single marker octet can introduce
pub const MAX_LITERAL_RUN: usize = 127;

const LITERAL_MARKER: u8 = 0x80;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompressionError {
    #[error("compressed data ends inside the item starting at offset {offset}")]
    Truncated { offset: usize },

    #[error(
        "slice descriptor at offset {offset} points {distance} octets back, only {available} decompressed"
    )]
    BackReference {
        offset: usize,
        distance: usize,
        available: usize,
    },
}

/// Compresses `input` using the largest window a descriptor can address.
pub fn compress(input: &[u8]) -> Vec<u8> {
    compress_with_window(input, MAX_WINDOW)
}

/// Compresses `input`, looking back at most `window` octets (clamped to 511).
///
/// The first two octets are always emitted as literals. Matches never
/// overlap the current position, so the decompressor can copy them in one go.
pub fn compress_with_window(input: &[u8], window: usize) -> Vec<u8> {
    let window = window.min(MAX_WINDOW);
    let mut output = Vec::with_capacity(input.len() + input.len() / MAX_LITERAL_RUN + 1);
    let mut literal_start = 0;
    let mut position = input.len().min(2);

    while position < input.len() {
        match longest_match(input, position, window) {
            Some((length, distance)) => {
                flush_literals(&mut output, &input[literal_start..position]);
                let descriptor = ((length as u16 & 0x3F) << 9) | (distance as u16 & 0x1FF);
                output.extend_from_slice(&descriptor.to_be_bytes());
                position += length;
                literal_start = position;
            }
            None => position += 1,
        }
    }
    flush_literals(&mut output, &input[literal_start..]);
    output
}

/// Reverses [`compress`].
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut output = Vec::with_capacity(input.len() * 2);
    let mut offset = 0;
    while offset < input.len() {
        let marker = input[offset];
        if marker & LITERAL_MARKER != 0 {
            let length = (marker & !LITERAL_MARKER) as usize;
            let literals = input
                .get(offset + 1..offset + 1 + length)
                .ok_or(CompressionError::Truncated { offset })?;
            output.extend_from_slice(literals);
            offset += 1 + length;
        } else {
            let low = *input
                .get(offset + 1)
                .ok_or(CompressionError::Truncated { offset })?;
            let descriptor = u16::from_be_bytes([marker, low]);
            let length = (descriptor >> 9) as usize & 0x3F;
            let distance = (descriptor & 0x1FF) as usize;
            if distance == 0 || distance > output.len() {
                return Err(CompressionError::BackReference {
                    offset,
                    distance,
                    available: output.len(),
                });
            }
            let start = output.len() - distance;
            for i in 0..length {
                let byte = output[start + i];
                output.push(byte);
            }
            offset += 2;
        }
    }
    Ok(output)
}

/// Finds the longest earlier slice equal to the data at `position`.
///
/// Candidates must end at or before `position`. Among equally long slices
/// the nearest one wins.
fn longest_match(input: &[u8], position: usize, window: usize) -> Option<(usize, usize)> {
    let limit = MAX_SLICE.min(input.len() - position);
    if limit < MIN_SLICE {
        return None;
    }
    let earliest = position.saturating_sub(window);
    let mut best: Option<(usize, usize)> = None;

    for start in (earliest..=position.saturating_sub(MIN_SLICE)).rev() {
        let reach = limit.min(position - start);
        let length = input[start..start + reach]
            .iter()
            .zip(&input[position..position + reach])
            .take_while(|(a, b)| a == b)
            .count();
        if length >= MIN_SLICE && best.is_none_or(|(longest, _)| length > longest) {
            best = Some((length, position - start));
            if length == limit {
                break;
            }
        }
    }
    best
}

fn flush_literals(output: &mut Vec<u8>, literals: &[u8]) {
    for run in literals.chunks(MAX_LITERAL_RUN) {
        output.push(LITERAL_MARKER | run.len() as u8);
        output.extend_from_slice(run);
    }
}
