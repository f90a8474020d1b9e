use super::EncodingError;

pub fn encode(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

pub fn decode(data: &[u8]) -> Result<String, EncodingError> {
    if data.len() % 2 != 0 {
        return Err(EncodingError::OddLength(data.len()));
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| EncodingError::InvalidUtf16)
}

pub(super) fn split_point(data: &[u8], max: usize) -> usize {
    let point = max & !1;
    if point >= 2 {
        let unit = u16::from_be_bytes([data[point - 2], data[point - 1]]);
        // Keep surrogate pairs in one segment.
        if (0xD800..0xDC00).contains(&unit) {
            return point - 2;
        }
    }
    point
}
