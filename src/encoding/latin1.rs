use super::{Alphabet, EncodingError};

pub fn encode(text: &str) -> Result<Vec<u8>, EncodingError> {
    text.chars()
        .map(|ch| {
            u8::try_from(u32::from(ch)).map_err(|_| EncodingError::Unmappable {
                ch,
                alphabet: Alphabet::Latin1,
            })
        })
        .collect()
}

pub fn decode(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}
