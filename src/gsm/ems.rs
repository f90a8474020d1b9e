// ABOUTME: Enhanced Messaging Service elements: extended objects, compressed data and pictures
// ABOUTME: Objects stream across segments in IE chunks; pictures are written whole into one segment

use crate::gsm::compression::{self, CompressionError};
use crate::gsm::element::Iei;
use crate::gsm::UserDataError;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::TryFromPrimitive;

/// Extended object types (3GPP TS 23.040 section 9.2.3.24.10.1.11)
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    PredefinedSound = 0x00,
    IMelody = 0x01,
    BlackAndWhiteBitmap = 0x02,
    GreyscaleBitmap = 0x03,
    ColourBitmap = 0x04,
    PredefinedAnimation = 0x05,
    BlackAndWhiteAnimation = 0x06,
    GreyscaleAnimation = 0x07,
    ColourAnimation = 0x08,
    VCard = 0x09,
    VCalendar = 0x0A,
    VectorGraphics = 0x0B,
    PolyphonicMelody = 0x0C,
    DataFormatDeliveryRequest = 0xFF,
}

/// An extended object (IEI 0x14).
///
/// The encoded form is a 7 octet header followed by the object data. An
/// object bigger than one segment is split into several IEs with the header
/// only in the first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedObject {
    reference: u8,
    format: ObjectFormat,
    position: u16,
    may_forward: bool,
    user_prompt: bool,
    data: Bytes,
}

impl ExtendedObject {
    pub const HEADER_LEN: usize = 7;

    const NO_FORWARD: u8 = 0x01;
    const USER_PROMPT: u8 = 0x02;

    pub fn new(
        format: ObjectFormat,
        reference: u8,
        data: impl Into<Bytes>,
    ) -> Result<Self, UserDataError> {
        let data = data.into();
        // The record length field covers the object header too
        if data.len() > u16::MAX as usize - Self::HEADER_LEN {
            return Err(UserDataError::ObjectTooLarge(data.len()));
        }
        Ok(Self {
            reference,
            format,
            position: 0,
            may_forward: true,
            user_prompt: false,
            data,
        })
    }

    /// Position in the text where the object is displayed
    pub fn with_position(mut self, position: u16) -> Self {
        self.position = position;
        self
    }

    pub fn with_may_forward(mut self, may_forward: bool) -> Self {
        self.may_forward = may_forward;
        self
    }

    pub fn with_user_prompt(mut self, user_prompt: bool) -> Self {
        self.user_prompt = user_prompt;
        self
    }

    pub fn reference(&self) -> u8 {
        self.reference
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn position(&self) -> u16 {
        self.position
    }

    pub fn may_forward(&self) -> bool {
        self.may_forward
    }

    pub fn user_prompt(&self) -> bool {
        self.user_prompt
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.data.len()
    }

    /// Header plus data, as carried across the object's IE chunks.
    pub fn encode(&self) -> Bytes {
        let mut control = 0;
        if !self.may_forward {
            control |= Self::NO_FORWARD;
        }
        if self.user_prompt {
            control |= Self::USER_PROMPT;
        }
        let mut buffer = BytesMut::with_capacity(self.encoded_len());
        buffer.put_u8(self.reference);
        buffer.put_u16(self.data.len() as u16);
        buffer.put_u8(control);
        buffer.put_u8(self.format as u8);
        buffer.put_u16(self.position);
        buffer.extend_from_slice(&self.data);
        buffer.freeze()
    }

    /// Decodes an object from its header and data, trailing octets ignored.
    pub fn decode(encoded: &[u8]) -> Result<Self, UserDataError> {
        if encoded.len() < Self::HEADER_LEN {
            return Err(UserDataError::MalformedHeader("extended object header truncated"));
        }
        let length = u16::from_be_bytes([encoded[1], encoded[2]]) as usize;
        let data = encoded
            .get(Self::HEADER_LEN..Self::HEADER_LEN + length)
            .ok_or(UserDataError::MalformedHeader("extended object data truncated"))?;
        let format = ObjectFormat::try_from(encoded[4])
            .map_err(|_| UserDataError::MalformedHeader("unknown extended object format"))?;
        Ok(Self {
            reference: encoded[0],
            format,
            position: u16::from_be_bytes([encoded[5], encoded[6]]),
            may_forward: encoded[3] & Self::NO_FORWARD == 0,
            user_prompt: encoded[3] & Self::USER_PROMPT != 0,
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Rebuilds an object from the data of its IE chunks in segment order.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Result<Self, UserDataError> {
        let encoded: Vec<u8> = chunks.into_iter().flatten().copied().collect();
        Self::decode(&encoded)
    }
}

/// Compressed extended objects (IEI 0x16).
///
/// Objects are serialised as `[0x14][length][object]` records, compressed
/// as a whole, and streamed behind a 3 octet sub-header carrying the
/// compressed length. [`compress`](CompressedData::compress) must run before
/// the element is packed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompressedData {
    objects: Vec<ExtendedObject>,
    compressed: Option<Bytes>,
}

impl CompressedData {
    pub const HEADER_LEN: usize = 3;

    /// Compression algorithm id in the sub-header
    const ALGORITHM: u8 = 0x00;

    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object. Invalidates any earlier compression.
    pub fn add(&mut self, object: ExtendedObject) {
        self.objects.push(object);
        self.compressed = None;
    }

    pub fn objects(&self) -> &[ExtendedObject] {
        &self.objects
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }

    pub fn compressed(&self) -> Option<&Bytes> {
        self.compressed.as_ref()
    }

    /// The uncompressed record stream.
    pub fn uncompressed(&self) -> Bytes {
        let mut buffer = BytesMut::new();
        for object in &self.objects {
            buffer.put_u8(Iei::ExtendedObject as u8);
            buffer.put_u16(object.encoded_len() as u16);
            buffer.extend_from_slice(&object.encode());
        }
        buffer.freeze()
    }

    pub fn compress(&mut self) -> Result<&Bytes, UserDataError> {
        let compressed = compression::compress(&self.uncompressed());
        if compressed.len() > u16::MAX as usize {
            return Err(UserDataError::ObjectTooLarge(compressed.len()));
        }
        Ok(&*self.compressed.insert(Bytes::from(compressed)))
    }

    /// Total encoded length: the sub-header plus the compressed bytes.
    ///
    /// # Panics
    ///
    /// Panics if [`compress`](CompressedData::compress) has not been called.
    pub fn length(&self) -> usize {
        Self::HEADER_LEN + self.require_compressed().len()
    }

    /// Sub-header and compressed bytes, as carried across the IE chunks.
    ///
    /// # Panics
    ///
    /// Panics if [`compress`](CompressedData::compress) has not been called.
    pub(crate) fn stream(&self) -> Bytes {
        let compressed = self.require_compressed();
        let mut buffer = BytesMut::with_capacity(Self::HEADER_LEN + compressed.len());
        buffer.put_u8(Self::ALGORITHM);
        buffer.put_u16(compressed.len() as u16);
        buffer.extend_from_slice(compressed);
        buffer.freeze()
    }

    /// Rebuilds the objects from the data of the IE chunks in segment order.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Result<Self, UserDataError> {
        let stream: Vec<u8> = chunks.into_iter().flatten().copied().collect();
        if stream.len() < Self::HEADER_LEN {
            return Err(UserDataError::MalformedHeader("compressed data header truncated"));
        }
        let length = u16::from_be_bytes([stream[1], stream[2]]) as usize;
        let compressed = stream
            .get(Self::HEADER_LEN..Self::HEADER_LEN + length)
            .ok_or(UserDataError::Compression(CompressionError::Truncated {
                offset: stream.len(),
            }))?;
        let uncompressed = compression::decompress(compressed)?;

        let mut data = Self::new();
        let mut rest = &uncompressed[..];
        while !rest.is_empty() {
            if rest.len() < 3 || rest[0] != Iei::ExtendedObject as u8 {
                return Err(UserDataError::MalformedHeader("bad compressed object record"));
            }
            let length = u16::from_be_bytes([rest[1], rest[2]]) as usize;
            let record = rest
                .get(3..3 + length)
                .ok_or(UserDataError::MalformedHeader("compressed object record truncated"))?;
            data.objects.push(ExtendedObject::decode(record)?);
            rest = &rest[3 + length..];
        }
        data.compressed = Some(Bytes::copy_from_slice(compressed));
        Ok(data)
    }

    fn require_compressed(&self) -> &Bytes {
        match &self.compressed {
            Some(compressed) => compressed,
            None => panic!("CompressedData must be compressed before it is encoded"),
        }
    }
}

/// A monochrome bitmap, one bit per pixel, set bits are black.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    pixels: Vec<bool>,
}

impl Bitmap {
    /// A blank (all white) bitmap
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width as usize * height as usize],
        }
    }

    /// Builds a bitmap from rows packed most significant bit first, each row
    /// padded to a whole octet.
    pub fn from_rows(width: u16, height: u16, rows: &[u8]) -> Result<Self, UserDataError> {
        let row_octets = (width as usize).div_ceil(8);
        if rows.len() != row_octets * height as usize {
            return Err(UserDataError::BitmapSize {
                width,
                height,
                actual: rows.len(),
            });
        }
        let mut bitmap = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let octet = rows[y as usize * row_octets + x as usize / 8];
                bitmap.set(x, y, octet & (0x80 >> (x % 8)) != 0);
            }
        }
        Ok(bitmap)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Whether the pixel at column `x`, row `y` is black.
    ///
    /// # Panics
    ///
    /// Panics if `x` is not less than the width or `y` not less than the height.
    pub fn get(&self, x: u16, y: u16) -> bool {
        self.pixels[self.index(x, y)]
    }

    /// # Panics
    ///
    /// Panics if `x` is not less than the width or `y` not less than the height.
    pub fn set(&mut self, x: u16, y: u16, black: bool) {
        let index = self.index(x, y);
        self.pixels[index] = black;
    }

    /// Pixels as one continuous bit stream, most significant bit first,
    /// with the final octet padded with zero bits.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut packed = vec![0u8; self.pixels.len().div_ceil(8)];
        for (i, _) in self.pixels.iter().enumerate().filter(|(_, black)| **black) {
            packed[i / 8] |= 0x80 >> (i % 8);
        }
        packed
    }

    fn index(&self, x: u16, y: u16) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} bitmap",
            self.width,
            self.height
        );
        y as usize * self.width as usize + x as usize
    }
}

/// An EMS picture (IEI 0x10, 0x11 or 0x12), written whole into one segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    iei: Iei,
    data: Bytes,
}

impl Picture {
    /// Largest bitmap a variable picture carries in one element
    pub const MAX_VARIABLE_OCTETS: usize = 128;

    /// A 32x32 picture
    pub fn large(position: u8, bitmap: &Bitmap) -> Result<Self, UserDataError> {
        Self::fixed(Iei::LargePicture, 32, position, bitmap)
    }

    /// A 16x16 picture
    pub fn small(position: u8, bitmap: &Bitmap) -> Result<Self, UserDataError> {
        Self::fixed(Iei::SmallPicture, 16, position, bitmap)
    }

    /// A picture of any width that is a multiple of 8, up to 128 octets of pixels
    pub fn variable(position: u8, bitmap: &Bitmap) -> Result<Self, UserDataError> {
        if bitmap.width() % 8 != 0 {
            return Err(UserDataError::PictureWidth(bitmap.width()));
        }
        let pixels = bitmap.to_packed();
        if pixels.len() > Self::MAX_VARIABLE_OCTETS || bitmap.height() > u8::MAX as u16 {
            return Err(UserDataError::PictureTooLarge(pixels.len()));
        }
        let mut data = BytesMut::with_capacity(3 + pixels.len());
        data.put_u8(position);
        data.put_u8((bitmap.width() / 8) as u8);
        data.put_u8(bitmap.height() as u8);
        data.extend_from_slice(&pixels);
        Ok(Self {
            iei: Iei::VariablePicture,
            data: data.freeze(),
        })
    }

    fn fixed(iei: Iei, size: u16, position: u8, bitmap: &Bitmap) -> Result<Self, UserDataError> {
        if bitmap.width() != size || bitmap.height() != size {
            return Err(UserDataError::PictureDimensions {
                expected_width: size,
                expected_height: size,
                width: bitmap.width(),
                height: bitmap.height(),
            });
        }
        let mut data = BytesMut::with_capacity(1 + (size as usize * size as usize) / 8);
        data.put_u8(position);
        data.extend_from_slice(&bitmap.to_packed());
        Ok(Self {
            iei,
            data: data.freeze(),
        })
    }

    pub fn iei(&self) -> Iei {
        self.iei
    }

    /// Position octet followed by any dimensions and the pixels.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn position(&self) -> u8 {
        self.data[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsm::element::{ElementState, HeaderElement, Segment, SEGMENT_CAPACITY};

    fn melody() -> ExtendedObject {
        ExtendedObject::new(
            ObjectFormat::IMelody,
            0,
            Bytes::from_static(b"BEGIN:IMELODY\r\nMELODY:c2d2e2f2g2c2d2e2f2g2\r\nEND:IMELODY\r\n"),
        )
        .unwrap()
    }

    #[test]
    fn extended_object_header_layout() {
        let object = ExtendedObject::new(ObjectFormat::VCard, 3, vec![0xAA, 0xBB])
            .unwrap()
            .with_position(0x0102)
            .with_may_forward(false)
            .with_user_prompt(true);
        let encoded = object.encode();
        assert_eq!(&encoded[..], &[3, 0x00, 0x02, 0x03, 0x09, 0x01, 0x02, 0xAA, 0xBB]);
        assert_eq!(ExtendedObject::decode(&encoded).unwrap(), object);
    }

    #[test]
    fn object_record_length_fits_sixteen_bits() {
        let largest = u16::MAX as usize - ExtendedObject::HEADER_LEN;
        let object = ExtendedObject::new(ObjectFormat::VCard, 0, vec![0u8; largest]).unwrap();
        assert_eq!(object.encoded_len(), u16::MAX as usize);

        let mut compressed = CompressedData::new();
        compressed.add(object);
        let stream = compressed.uncompressed();
        assert_eq!(&stream[1..3], &[0xFF, 0xFF]);

        assert_eq!(
            ExtendedObject::new(ObjectFormat::VCard, 0, vec![0u8; largest + 1]),
            Err(UserDataError::ObjectTooLarge(largest + 1))
        );
    }

    #[test]
    #[should_panic(expected = "outside 8x4 bitmap")]
    fn bitmap_get_outside_bounds_panics() {
        Bitmap::new(8, 4).get(8, 0);
    }

    #[test]
    #[should_panic(expected = "outside 8x4 bitmap")]
    fn bitmap_set_outside_bounds_panics() {
        Bitmap::new(8, 4).set(0, 4, true);
    }

    #[test]
    fn compressed_data_round_trip() {
        let mut compressed = CompressedData::new();
        compressed.add(melody());
        compressed.add(melody().with_position(4));
        assert!(!compressed.is_compressed());
        let packed_len = compressed.compress().unwrap().len();
        assert!(packed_len < compressed.uncompressed().len());
        assert_eq!(compressed.length(), packed_len + 3);

        let stream = compressed.stream();
        assert_eq!(stream[0], 0);
        assert_eq!(u16::from_be_bytes([stream[1], stream[2]]) as usize, packed_len);

        let (first, second) = stream.split_at(10);
        let decoded = CompressedData::from_chunks([first, second]).unwrap();
        assert_eq!(decoded.objects(), compressed.objects());
    }

    #[test]
    #[should_panic(expected = "must be compressed")]
    fn length_before_compress_panics() {
        let mut compressed = CompressedData::new();
        compressed.add(melody());
        compressed.length();
    }

    #[test]
    fn adding_object_invalidates_compression() {
        let mut compressed = CompressedData::new();
        compressed.add(melody());
        compressed.compress().unwrap();
        compressed.add(melody());
        assert!(!compressed.is_compressed());
    }

    #[test]
    fn fixed_pictures_check_dimensions() {
        let bitmap = Bitmap::new(16, 16);
        assert!(Picture::small(0, &bitmap).is_ok());
        assert_eq!(
            Picture::large(0, &bitmap),
            Err(UserDataError::PictureDimensions {
                expected_width: 32,
                expected_height: 32,
                width: 16,
                height: 16
            })
        );
        let large = Picture::large(5, &Bitmap::new(32, 32)).unwrap();
        assert_eq!(large.data().len(), 129);
        assert_eq!(large.position(), 5);
        assert_eq!(large.iei(), Iei::LargePicture);
    }

    #[test]
    fn variable_picture_carries_dimensions() {
        let mut bitmap = Bitmap::new(8, 2);
        bitmap.set(0, 0, true);
        bitmap.set(7, 1, true);
        let picture = Picture::variable(1, &bitmap).unwrap();
        assert_eq!(picture.data(), &[1, 1, 2, 0x80, 0x01]);

        assert_eq!(
            Picture::variable(0, &Bitmap::new(12, 2)),
            Err(UserDataError::PictureWidth(12))
        );
        assert_eq!(
            Picture::variable(0, &Bitmap::new(64, 17)),
            Err(UserDataError::PictureTooLarge(136))
        );
    }

    #[test]
    fn bitmap_from_rows_reads_padded_rows() {
        let bitmap = Bitmap::from_rows(10, 2, &[0x80, 0x40, 0x00, 0x80]).unwrap();
        assert!(bitmap.get(0, 0));
        assert!(bitmap.get(9, 0));
        assert!(bitmap.get(8, 1));
        assert!(!bitmap.get(1, 1));
        assert!(Bitmap::from_rows(10, 2, &[0x00]).is_err());
    }

    #[test]
    fn picture_is_written_whole() {
        let element = HeaderElement::from(Picture::large(0, &Bitmap::new(32, 32)).unwrap());
        let mut state = ElementState::new();
        let mut segment = Segment::new(130);
        assert!(!element.write(&mut state, 0, &mut segment));
        let mut segment = Segment::new(SEGMENT_CAPACITY);
        assert!(element.write(&mut state, 0, &mut segment));
        assert_eq!(&segment.as_slice()[..2], &[0x10, 129]);
        assert!(element.is_complete(&state));
    }
}
