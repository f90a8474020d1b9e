// ABOUTME: GSM user data: header elements, the segment writer, compression and EMS/NSM content
// ABOUTME: Produces 140 octet segments with a User Data Header and parses them back

pub mod compression;
pub mod element;
pub mod ems;
mod error;
pub mod nsm;
pub mod udh;
pub mod user_data;

pub use compression::{CompressionError, compress, compress_with_window, decompress};
pub use element::{
    Concatenation, ElementState, HeaderElement, Iei, PortAddressing, PortWidth, ReferenceWidth,
    SEGMENT_CAPACITY, Segment, UserPromptIndicator,
};
pub use ems::{Bitmap, CompressedData, ExtendedObject, ObjectFormat, Picture};
pub use error::UserDataError;
pub use nsm::{OtaBitmap, PictureMessage};
pub use udh::{ConcatenationInfo, InformationElement, UserDataHeader};
pub use user_data::{MAX_SEGMENTS, UserData};
