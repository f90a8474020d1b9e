//! GSM 03.38 default alphabet with the default extension table, plus the
//! septet packing used on the air interface.

use super::{Alphabet, EncodingError};

/// Escape to the extension table
pub const ESCAPE: u8 = 0x1B;

const CR: u8 = 0x0D;

#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@',      '\u{a3}', '$',      '\u{a5}', '\u{e8}', '\u{e9}', '\u{f9}', '\u{ec}',
    '\u{f2}', '\u{c7}', '\n',     '\u{d8}', '\u{f8}', '\r',     '\u{c5}', '\u{e5}',
    '\u{394}','_',      '\u{3a6}','\u{393}','\u{39b}','\u{3a9}','\u{3a0}','\u{3a8}',
    '\u{3a3}','\u{398}','\u{39e}','\u{a0}', '\u{c6}', '\u{e6}', '\u{df}', '\u{c9}',
    ' ',      '!',      '"',      '#',      '\u{a4}', '%',      '&',      '\'',
    '(',      ')',      '*',      '+',      ',',      '-',      '.',      '/',
    '0',      '1',      '2',      '3',      '4',      '5',      '6',      '7',
    '8',      '9',      ':',      ';',      '<',      '=',      '>',      '?',
    '\u{a1}', 'A',      'B',      'C',      'D',      'E',      'F',      'G',
    'H',      'I',      'J',      'K',      'L',      'M',      'N',      'O',
    'P',      'Q',      'R',      'S',      'T',      'U',      'V',      'W',
    'X',      'Y',      'Z',      '\u{c4}', '\u{d6}', '\u{d1}', '\u{dc}', '\u{a7}',
    '\u{bf}', 'a',      'b',      'c',      'd',      'e',      'f',      'g',
    'h',      'i',      'j',      'k',      'l',      'm',      'n',      'o',
    'p',      'q',      'r',      's',      't',      'u',      'v',      'w',
    'x',      'y',      'z',      '\u{e4}', '\u{f6}', '\u{f1}', '\u{fc}', '\u{e0}',
];

const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '\u{20ac}'),
];

/// Encodes text to unpacked septets, one per octet.
pub fn encode(text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut septets = Vec::with_capacity(text.len());
    for ch in text.chars() {
        // 0x1B is the escape, never a character of its own
        if let Some(code) = BASIC
            .iter()
            .position(|&c| c == ch)
            .filter(|&code| code != ESCAPE as usize)
        {
            septets.push(code as u8);
        } else if let Some(&(code, _)) = EXTENSION.iter().find(|(_, c)| *c == ch) {
            septets.push(ESCAPE);
            septets.push(code);
        } else {
            return Err(EncodingError::Unmappable {
                ch,
                alphabet: Alphabet::Gsm7Bit,
            });
        }
    }
    Ok(septets)
}

/// Decodes unpacked septets. Unknown extension codes decode as their basic
/// table character, as 03.38 requires.
pub fn decode(septets: &[u8]) -> Result<String, EncodingError> {
    let mut text = String::with_capacity(septets.len());
    let mut escaped = false;
    for &septet in septets {
        if septet > 0x7F {
            return Err(EncodingError::InvalidSeptet(septet));
        }
        if escaped {
            escaped = false;
            match EXTENSION.iter().find(|(code, _)| *code == septet) {
                Some(&(_, ch)) => text.push(ch),
                None => text.push(BASIC[septet as usize]),
            }
        } else if septet == ESCAPE {
            escaped = true;
        } else {
            text.push(BASIC[septet as usize]);
        }
    }
    Ok(text)
}

pub(super) fn split_point(septets: &[u8], max: usize) -> usize {
    let mut boundary = 0;
    let mut index = 0;
    while index < septets.len() {
        let width = if septets[index] == ESCAPE { 2 } else { 1 };
        if index + width > max {
            break;
        }
        index += width;
        boundary = index;
    }
    boundary
}

/// Number of fill bits needed after a user data header of `udh_octets`
/// octets so that the first septet starts on a septet boundary.
pub fn fill_bits(udh_octets: usize) -> usize {
    (7 - (udh_octets * 8) % 7) % 7
}

/// Maximum number of septets that fit in `capacity` octets after a header
/// of `udh_octets` octets (zero for no header).
pub fn septet_capacity(capacity: usize, udh_octets: usize) -> usize {
    let bits = capacity.saturating_sub(udh_octets) * 8;
    bits.saturating_sub(fill_bits(udh_octets)) / 7
}

/// Packs septets into octets, least significant bit first, after `fill`
/// leading zero bits. When exactly 7 bits would be left unused in the final
/// octet they carry a CR so the receiver does not decode a trailing '@'.
/// A final CR that ends on an octet boundary is followed by a second CR so
/// it cannot be mistaken for that padding.
pub fn pack(septets: &[u8], fill: usize) -> Vec<u8> {
    let end = fill + septets.len() * 7;
    let doubled = end % 8 == 0 && septets.last() == Some(&CR);
    let total_bits = if doubled { end + 7 } else { end };
    let mut packed = vec![0u8; total_bits.div_ceil(8)];
    for (i, &septet) in septets.iter().enumerate() {
        put_septet(&mut packed, fill + i * 7, septet);
    }
    if doubled {
        put_septet(&mut packed, end, CR);
    }
    if packed.len() * 8 - total_bits == 7 {
        put_septet(&mut packed, total_bits, CR);
    }
    packed
}

/// Unpacks octets produced by [`pack`]. A CR padding septet in the final
/// 7 bits is removed, as is the second CR of a pair whose first CR ends on
/// an octet boundary.
///
/// Text that really ends in two CRs with the first on an octet boundary
/// reads back with a single CR. [`round_trips`] detects that case.
pub fn unpack(packed: &[u8], fill: usize) -> Vec<u8> {
    let bits = (packed.len() * 8).saturating_sub(fill);
    let count = bits / 7;
    let mut septets: Vec<u8> = (0..count)
        .map(|i| {
            let position = fill + i * 7;
            let index = position / 8;
            let shift = position % 8;
            let mut value = u16::from(packed[index]) >> shift;
            if shift > 1 {
                if let Some(&next) = packed.get(index + 1) {
                    value |= u16::from(next) << (8 - shift);
                }
            }
            (value & 0x7F) as u8
        })
        .collect();
    if bits % 7 == 0 && septets.last() == Some(&CR) {
        septets.pop();
    } else if septets.ends_with(&[CR, CR]) && (fill + (count - 1) * 7) % 8 == 0 {
        septets.pop();
    }
    septets
}

/// Whether `septets` read back unchanged from [`pack`] at `fill`.
pub fn round_trips(septets: &[u8], fill: usize) -> bool {
    unpack(&pack(septets, fill), fill) == septets
}

fn put_septet(packed: &mut [u8], position: usize, septet: u8) {
    let index = position / 8;
    let shift = position % 8;
    packed[index] |= septet << shift;
    if shift > 1 {
        packed[index + 1] |= septet >> (8 - shift);
    }
}
