// ABOUTME: Character alphabets for SMS user data and code-unit aware split points
// ABOUTME: Encodes text to wire code units and never lets a segment boundary split a character

pub mod gsm7;
pub mod latin1;
pub mod ucs2;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("character {ch:?} has no code point in {alphabet:?}")]
    Unmappable { ch: char, alphabet: Alphabet },

    #[error("septet 0x{0:02X} is outside the GSM default alphabet")]
    InvalidSeptet(u8),

    #[error("UCS2 data has odd length {0}")]
    OddLength(usize),

    #[error("UCS2 data is not valid UTF-16")]
    InvalidUtf16,

    #[error("the binary alphabet carries raw octets, not text")]
    NotText,
}

/// The alphabets a logical message can be encoded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// GSM 03.38 default alphabet, one septet per character (two for the
    /// extension table), packed 8 septets into 7 octets on the air interface.
    Gsm7Bit,
    /// ISO-8859-1, one octet per character
    Latin1,
    /// Raw 8-bit data
    Binary,
    /// UCS2 / UTF-16 big endian, two octets per code unit
    Ucs2,
}

impl Alphabet {
    /// Bits used on the wire per code unit.
    pub fn bits_per_unit(&self) -> usize {
        match self {
            Alphabet::Gsm7Bit => 7,
            Alphabet::Latin1 | Alphabet::Binary => 8,
            Alphabet::Ucs2 => 16,
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, Alphabet::Binary)
    }

    /// Encodes text into code units. GSM output is unpacked, one septet per octet.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            Alphabet::Gsm7Bit => gsm7::encode(text),
            Alphabet::Latin1 => latin1::encode(text),
            Alphabet::Ucs2 => Ok(ucs2::encode(text)),
            Alphabet::Binary => Err(EncodingError::NotText),
        }
    }

    /// Decodes code units back to text. GSM input must already be unpacked.
    pub fn decode(&self, data: &[u8]) -> Result<String, EncodingError> {
        match self {
            Alphabet::Gsm7Bit => gsm7::decode(data),
            Alphabet::Latin1 => Ok(latin1::decode(data)),
            Alphabet::Ucs2 => ucs2::decode(data),
            Alphabet::Binary => Err(EncodingError::NotText),
        }
    }

    /// Returns the largest prefix length of `data`, at most `max`, that ends
    /// on a character boundary.
    ///
    /// `data` holds unpacked code units, so for GSM `max` counts septets.
    /// GSM escape sequences and UTF-16 surrogate pairs are kept whole.
    pub fn split_point(&self, data: &[u8], max: usize) -> usize {
        if data.len() <= max {
            return data.len();
        }
        match self {
            Alphabet::Gsm7Bit => gsm7::split_point(data, max),
            Alphabet::Ucs2 => ucs2::split_point(data, max),
            Alphabet::Latin1 | Alphabet::Binary => max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_point_never_exceeds_data() {
        for alphabet in [
            Alphabet::Gsm7Bit,
            Alphabet::Latin1,
            Alphabet::Binary,
            Alphabet::Ucs2,
        ] {
            assert_eq!(alphabet.split_point(&[0x41, 0x42], 10), 2);
        }
    }

    #[test]
    fn ucs2_split_lands_on_even_offsets() {
        let data = Alphabet::Ucs2.encode("Characters").unwrap();
        assert_eq!(Alphabet::Ucs2.split_point(&data, 27), 26);
        assert_eq!(Alphabet::Ucs2.split_point(&data, 7), 6);
    }

    #[test]
    fn binary_is_not_text() {
        assert_eq!(Alphabet::Binary.encode("x"), Err(EncodingError::NotText));
        assert!(!Alphabet::Binary.is_text());
        assert!(Alphabet::Gsm7Bit.is_text());
    }
}
