// ABOUTME: Error type for building, packing and parsing GSM user data
// ABOUTME: Every variant is raised before any segment is handed out

use crate::datatypes::TlvError;
use crate::encoding::EncodingError;
use crate::gsm::compression::CompressionError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserDataError {
    #[error("port {port} is out of range (max {max})")]
    PortOutOfRange { port: u32, max: u32 },

    #[error("concatenation reference {0} does not fit an 8-bit reference")]
    ReferenceOutOfRange(u16),

    #[error("picture must be {expected_width}x{expected_height}, got {width}x{height}")]
    PictureDimensions {
        expected_width: u16,
        expected_height: u16,
        width: u16,
        height: u16,
    },

    #[error("variable picture width {0} is not a multiple of 8")]
    PictureWidth(u16),

    #[error("picture data of {0} octets is too big")]
    PictureTooLarge(usize),

    #[error("bitmap data of {actual} octets does not match {width}x{height}")]
    BitmapSize {
        width: u16,
        height: u16,
        actual: usize,
    },

    #[error("extended object data of {0} octets exceeds the 16-bit length field")]
    ObjectTooLarge(usize),

    #[error("concatenation is handled automatically and cannot be added")]
    ConcatenationNotAllowed,

    #[error("compressed data must be compressed before it is added")]
    NotCompressed,

    #[error("information element 0x{0:02X} can never fit in a segment")]
    ElementTooLarge(u8),

    #[error("user data needs {0} segments, at most 255 can be concatenated")]
    TooManySegments(usize),

    #[error("user data needs {0} segments, not a single SMS")]
    MultipleSegments(usize),

    #[error("malformed user data header: {0}")]
    MalformedHeader(&'static str),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Tlv(#[from] TlvError),
}
