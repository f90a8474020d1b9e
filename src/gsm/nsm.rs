// ABOUTME: Nokia Smart Messaging picture messages built on the segment writer
// ABOUTME: Encodes OTA bitmaps and the version/text/image item layout sent to port 0x158A

use crate::encoding::Alphabet;
use crate::gsm::element::PortAddressing;
use crate::gsm::ems::Bitmap;
use crate::gsm::user_data::UserData;
use crate::gsm::UserDataError;
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;

/// Destination port picture messages are addressed to
pub const PICTURE_MESSAGE_PORT: u16 = 0x158A;

/// An OTA bitmap: info field, dimensions, depth and the pixel stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtaBitmap {
    bitmap: Bitmap,
}

impl OtaBitmap {
    const LARGE_IMAGE: u8 = 0x10;

    pub fn new(bitmap: Bitmap) -> Self {
        Self { bitmap }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Images wider or taller than 255 pixels use 16-bit dimensions
    pub fn is_large(&self) -> bool {
        self.bitmap.width() > 255 || self.bitmap.height() > 255
    }

    pub fn encode(&self) -> Bytes {
        let pixels = self.bitmap.to_packed();
        let mut buffer = BytesMut::with_capacity(6 + pixels.len());
        if self.is_large() {
            buffer.put_u8(Self::LARGE_IMAGE);
            buffer.put_u16(self.bitmap.width());
            buffer.put_u16(self.bitmap.height());
        } else {
            buffer.put_u8(0);
            buffer.put_u8(self.bitmap.width() as u8);
            buffer.put_u8(self.bitmap.height() as u8);
        }
        // depth, monochrome
        buffer.put_u8(1);
        buffer.extend_from_slice(&pixels);
        buffer.freeze()
    }
}

/// A picture message: a text item followed by an image item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureMessage {
    bitmap: OtaBitmap,
    text: String,
    unicode: bool,
}

impl PictureMessage {
    const VERSION: u8 = b'0';
    const ITEM_LATIN1_TEXT: u8 = 0x00;
    const ITEM_UNICODE_TEXT: u8 = 0x01;
    const ITEM_OTA_BITMAP: u8 = 0x02;

    pub fn new(bitmap: OtaBitmap, text: impl Into<String>) -> Self {
        Self {
            bitmap,
            text: text.into(),
            unicode: false,
        }
    }

    /// Sends the text as UCS2 instead of Latin-1
    pub fn with_unicode(mut self, unicode: bool) -> Self {
        self.unicode = unicode;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bitmap(&self) -> &OtaBitmap {
        &self.bitmap
    }

    /// The message body: version, text item, image item.
    pub fn data(&self) -> Result<Bytes, UserDataError> {
        let (item, alphabet) = if self.unicode {
            (Self::ITEM_UNICODE_TEXT, Alphabet::Ucs2)
        } else {
            (Self::ITEM_LATIN1_TEXT, Alphabet::Latin1)
        };
        let text = alphabet.encode(&self.text)?;
        let image = self.bitmap.encode();
        let mut buffer = BytesMut::with_capacity(7 + text.len() + image.len());
        buffer.put_u8(Self::VERSION);
        buffer.put_u8(item);
        buffer.put_u16(text.len() as u16);
        buffer.extend_from_slice(&text);
        buffer.put_u8(Self::ITEM_OTA_BITMAP);
        buffer.put_u16(image.len() as u16);
        buffer.extend_from_slice(&image);
        Ok(buffer.freeze())
    }

    /// User data addressed to the picture message port.
    pub fn user_data(&self) -> Result<UserData, UserDataError> {
        let mut user_data = UserData::new().with_data(self.data()?);
        user_data.add_header_element(PortAddressing::sixteen_bit(PICTURE_MESSAGE_PORT as u32, 0)?)?;
        Ok(user_data)
    }

    pub fn to_segments(&self, rng: &mut impl Rng) -> Result<Vec<Bytes>, UserDataError> {
        self.user_data()?.to_segments(rng)
    }
}
