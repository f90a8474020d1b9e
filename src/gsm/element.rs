// ABOUTME: User Data Header information elements and the per-message state used to write them
// ABOUTME: Elements are immutable descriptors; cursors, completion and patch offsets live in ElementState

use crate::gsm::UserDataError;
use crate::gsm::ems::{CompressedData, ExtendedObject, Picture};
use bytes::Bytes;
use num_enum::TryFromPrimitive;
use rand::Rng;
use tracing::trace;

/// Capacity of one SMS user data field in octets
pub const SEGMENT_CAPACITY: usize = 140;

/// Octets taken by the IEI and length fields of every information element
pub const IE_HEADER_LEN: usize = 2;

/// Information element identifiers (3GPP TS 23.040 section 9.2.3.24)
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Iei {
    Concatenated8Bit = 0x00,
    ApplicationPort8Bit = 0x04,
    ApplicationPort16Bit = 0x05,
    Concatenated16Bit = 0x08,
    LargePicture = 0x10,
    SmallPicture = 0x11,
    VariablePicture = 0x12,
    UserPromptIndicator = 0x13,
    ExtendedObject = 0x14,
    CompressionControl = 0x16,
}

/// One segment under construction. Never grows past its capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    data: Vec<u8>,
    capacity: usize,
}

impl Segment {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Appends as much of `src` as fits and returns the number of octets taken.
    pub fn put_slice(&mut self, src: &[u8]) -> usize {
        let count = src.len().min(self.remaining());
        self.data.extend_from_slice(&src[..count]);
        count
    }

    pub fn put_u8(&mut self, value: u8) -> bool {
        self.put_slice(&[value]) == 1
    }

    /// Overwrites one already written octet.
    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }

    /// Writes a whole information element, or nothing if it does not fit.
    fn put_ie(&mut self, iei: u8, data: &[u8]) -> bool {
        if self.remaining() < IE_HEADER_LEN + data.len() {
            return false;
        }
        self.data.push(iei);
        self.data.push(data.len() as u8);
        self.data.extend_from_slice(data);
        true
    }
}

/// Mutable state of one element while one message is being segmented.
///
/// A fresh state (or one that has been [`reset`](ElementState::reset)) must
/// be used for every message; the element itself is never modified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementState {
    cursor: usize,
    complete: bool,
    patches: Vec<(usize, usize)>,
}

impl ElementState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Octets of a streamed element written so far
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `(segment index, byte offset)` pairs recorded for back-patching
    pub fn patches(&self) -> &[(usize, usize)] {
        &self.patches
    }
}

/// Width of the concatenation reference number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReferenceWidth {
    #[default]
    Eight,
    Sixteen,
}

impl ReferenceWidth {
    pub fn max_reference(&self) -> u16 {
        match self {
            ReferenceWidth::Eight => u8::MAX as u16,
            ReferenceWidth::Sixteen => u16::MAX,
        }
    }
}

/// Concatenated short message information element (IEI 0x00 or 0x08).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Concatenation {
    width: ReferenceWidth,
    reference: u16,
}

impl Concatenation {
    pub fn new(width: ReferenceWidth, reference: u16) -> Result<Self, UserDataError> {
        if reference > width.max_reference() {
            return Err(UserDataError::ReferenceOutOfRange(reference));
        }
        Ok(Self { width, reference })
    }

    /// Picks a reference number uniformly over the whole range of `width`.
    pub fn random(width: ReferenceWidth, rng: &mut impl Rng) -> Self {
        let reference = rng.gen_range(0..=width.max_reference());
        Self { width, reference }
    }

    pub fn width(&self) -> ReferenceWidth {
        self.width
    }

    pub fn reference(&self) -> u16 {
        self.reference
    }

    pub fn iei(&self) -> Iei {
        match self.width {
            ReferenceWidth::Eight => Iei::Concatenated8Bit,
            ReferenceWidth::Sixteen => Iei::Concatenated16Bit,
        }
    }

    /// IE data octets; the total is the second to last octet.
    pub fn data(&self, total: u8, sequence: u8) -> Vec<u8> {
        let mut data = match self.width {
            ReferenceWidth::Eight => vec![self.reference as u8],
            ReferenceWidth::Sixteen => self.reference.to_be_bytes().to_vec(),
        };
        data.push(total);
        data.push(sequence);
        data
    }

    /// A complete User Data Header holding only this element, length octet included.
    pub fn header(&self, total: u8, sequence: u8) -> Vec<u8> {
        let data = self.data(total, sequence);
        let mut header = Vec::with_capacity(1 + IE_HEADER_LEN + data.len());
        header.push((IE_HEADER_LEN + data.len()) as u8);
        header.push(self.iei() as u8);
        header.push(data.len() as u8);
        header.extend_from_slice(&data);
        header
    }
}

/// Width of application port numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortWidth {
    Eight,
    Sixteen,
}

/// Application port addressing information element (IEI 0x04 or 0x05).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortAddressing {
    width: PortWidth,
    destination: u16,
    source: u16,
}

impl PortAddressing {
    /// 8-bit ports, each 0-255
    pub fn eight_bit(destination: u16, source: u16) -> Result<Self, UserDataError> {
        for port in [destination, source] {
            if port > u8::MAX as u16 {
                return Err(UserDataError::PortOutOfRange {
                    port: port as u32,
                    max: u8::MAX as u32,
                });
            }
        }
        Ok(Self {
            width: PortWidth::Eight,
            destination,
            source,
        })
    }

    /// 16-bit ports, each 0-65535
    pub fn sixteen_bit(destination: u32, source: u32) -> Result<Self, UserDataError> {
        let check = |port: u32| {
            u16::try_from(port).map_err(|_| UserDataError::PortOutOfRange {
                port,
                max: u16::MAX as u32,
            })
        };
        Ok(Self {
            width: PortWidth::Sixteen,
            destination: check(destination)?,
            source: check(source)?,
        })
    }

    pub fn width(&self) -> PortWidth {
        self.width
    }

    pub fn destination(&self) -> u16 {
        self.destination
    }

    pub fn source(&self) -> u16 {
        self.source
    }

    fn data(&self) -> Vec<u8> {
        match self.width {
            PortWidth::Eight => vec![self.destination as u8, self.source as u8],
            PortWidth::Sixteen => {
                let mut data = self.destination.to_be_bytes().to_vec();
                data.extend_from_slice(&self.source.to_be_bytes());
                data
            }
        }
    }
}

/// User prompt indicator (IEI 0x13): the number of objects that follow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserPromptIndicator {
    pub objects: u8,
}

/// The closed set of elements the segment writer knows how to pack.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderElement {
    Concatenation(Concatenation),
    PortAddressing(PortAddressing),
    UserPrompt(UserPromptIndicator),
    Picture(Picture),
    ExtendedObject(ExtendedObject),
    CompressedData(CompressedData),
}

impl HeaderElement {
    pub fn iei(&self) -> u8 {
        let iei = match self {
            HeaderElement::Concatenation(concat) => concat.iei(),
            HeaderElement::PortAddressing(ports) => match ports.width {
                PortWidth::Eight => Iei::ApplicationPort8Bit,
                PortWidth::Sixteen => Iei::ApplicationPort16Bit,
            },
            HeaderElement::UserPrompt(_) => Iei::UserPromptIndicator,
            HeaderElement::Picture(picture) => picture.iei(),
            HeaderElement::ExtendedObject(_) => Iei::ExtendedObject,
            HeaderElement::CompressedData(_) => Iei::CompressionControl,
        };
        iei as u8
    }

    /// Encoded octet count, excluding the IEI and length octets.
    ///
    /// For streamed elements this is the total over every chunk.
    ///
    /// # Panics
    ///
    /// Panics for a [`CompressedData`] element that has not been compressed.
    pub fn length(&self) -> usize {
        match self {
            HeaderElement::Concatenation(concat) => match concat.width {
                ReferenceWidth::Eight => 3,
                ReferenceWidth::Sixteen => 4,
            },
            HeaderElement::PortAddressing(ports) => match ports.width {
                PortWidth::Eight => 2,
                PortWidth::Sixteen => 4,
            },
            HeaderElement::UserPrompt(_) => 1,
            HeaderElement::Picture(picture) => picture.data().len(),
            HeaderElement::ExtendedObject(object) => object.encoded_len(),
            HeaderElement::CompressedData(compressed) => compressed.length(),
        }
    }

    /// Recurring elements are written into every segment of a concatenated message.
    pub fn is_recurring(&self) -> bool {
        matches!(
            self,
            HeaderElement::Concatenation(_) | HeaderElement::PortAddressing(_)
        )
    }

    /// True once a non-recurring element has written all of its data.
    /// Recurring elements never complete.
    pub fn is_complete(&self, state: &ElementState) -> bool {
        !self.is_recurring() && state.complete
    }

    /// Writes this element into the remaining capacity of `segment`, the
    /// segment at position `index` (numbered from 0) of the message.
    ///
    /// Returns false and leaves the segment untouched when there is not
    /// enough room.
    ///
    /// # Panics
    ///
    /// Panics for a [`CompressedData`] element that has not been compressed.
    pub fn write(&self, state: &mut ElementState, index: usize, segment: &mut Segment) -> bool {
        let written = match self {
            HeaderElement::Concatenation(concat) => {
                let sequence = (index + 1) as u8;
                let offset = segment.len() + IE_HEADER_LEN + concat.data(1, sequence).len() - 2;
                let written = segment.put_ie(self.iei(), &concat.data(1, sequence));
                if written {
                    state.patches.push((index, offset));
                }
                written
            }
            HeaderElement::PortAddressing(ports) => segment.put_ie(self.iei(), &ports.data()),
            HeaderElement::UserPrompt(prompt) => segment.put_ie(self.iei(), &[prompt.objects]),
            HeaderElement::Picture(picture) => segment.put_ie(self.iei(), picture.data()),
            HeaderElement::ExtendedObject(object) => {
                self.write_chunk(state, segment, &object.encode(), ExtendedObject::HEADER_LEN)
            }
            HeaderElement::CompressedData(compressed) => {
                let stream = compressed.stream();
                self.write_chunk(state, segment, &stream, CompressedData::HEADER_LEN)
            }
        };
        if written && !self.is_recurring() && !self.is_streamed() {
            state.complete = true;
        }
        trace!(
            iei = self.iei(),
            index,
            written,
            remaining = segment.remaining(),
            "wrote header element"
        );
        written
    }

    /// Runs once all segments exist. Concatenation overwrites its placeholder
    /// total with the final segment count.
    pub fn post_process(&self, state: &ElementState, segments: &mut [Segment]) {
        if let HeaderElement::Concatenation(_) = self {
            let total = segments.len() as u8;
            for &(index, offset) in &state.patches {
                segments[index].set_u8(offset, total);
            }
        }
    }

    fn is_streamed(&self) -> bool {
        matches!(
            self,
            HeaderElement::ExtendedObject(_) | HeaderElement::CompressedData(_)
        )
    }

    /// Writes the next chunk of a streamed element. The first chunk must
    /// carry at least the element's own header; later chunks at least one
    /// octet.
    fn write_chunk(
        &self,
        state: &mut ElementState,
        segment: &mut Segment,
        stream: &[u8],
        header_len: usize,
    ) -> bool {
        let left = stream.len() - state.cursor;
        let minimum = (if state.cursor == 0 { header_len } else { 1 }).min(left);
        if segment.remaining() < IE_HEADER_LEN + minimum {
            return false;
        }
        let count = left
            .min(segment.remaining() - IE_HEADER_LEN)
            .min(u8::MAX as usize);
        let chunk = &stream[state.cursor..state.cursor + count];
        segment.put_ie(self.iei(), chunk);
        state.cursor += count;
        state.complete = state.cursor == stream.len();
        true
    }
}

impl From<Concatenation> for HeaderElement {
    fn from(concat: Concatenation) -> Self {
        HeaderElement::Concatenation(concat)
    }
}

impl From<PortAddressing> for HeaderElement {
    fn from(ports: PortAddressing) -> Self {
        HeaderElement::PortAddressing(ports)
    }
}

impl From<UserPromptIndicator> for HeaderElement {
    fn from(prompt: UserPromptIndicator) -> Self {
        HeaderElement::UserPrompt(prompt)
    }
}

impl From<Picture> for HeaderElement {
    fn from(picture: Picture) -> Self {
        HeaderElement::Picture(picture)
    }
}

impl From<ExtendedObject> for HeaderElement {
    fn from(object: ExtendedObject) -> Self {
        HeaderElement::ExtendedObject(object)
    }
}

impl From<CompressedData> for HeaderElement {
    fn from(compressed: CompressedData) -> Self {
        HeaderElement::CompressedData(compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsm::ems::ObjectFormat;

    #[test]
    fn port_ranges_are_checked_at_construction() {
        assert!(PortAddressing::eight_bit(255, 0).is_ok());
        assert_eq!(
            PortAddressing::eight_bit(256, 0),
            Err(UserDataError::PortOutOfRange { port: 256, max: 255 })
        );
        assert!(PortAddressing::sixteen_bit(65535, 0).is_ok());
        assert_eq!(
            PortAddressing::sixteen_bit(0, 65536),
            Err(UserDataError::PortOutOfRange {
                port: 65536,
                max: 65535
            })
        );
    }

    #[test]
    fn port_elements_encode_destination_first() {
        let element = HeaderElement::from(PortAddressing::sixteen_bit(0x158A, 0x1234).unwrap());
        let mut segment = Segment::new(SEGMENT_CAPACITY);
        assert!(element.write(&mut ElementState::new(), 0, &mut segment));
        assert_eq!(segment.as_slice(), &[0x05, 0x04, 0x15, 0x8A, 0x12, 0x34]);
        assert_eq!(element.length(), 4);
        assert!(element.is_recurring());

        let element = HeaderElement::from(PortAddressing::eight_bit(0xF5, 0x01).unwrap());
        let mut segment = Segment::new(SEGMENT_CAPACITY);
        assert!(element.write(&mut ElementState::new(), 0, &mut segment));
        assert_eq!(segment.as_slice(), &[0x04, 0x02, 0xF5, 0x01]);
    }

    #[test]
    fn concatenation_records_patch_offset() {
        let element = HeaderElement::from(Concatenation::new(ReferenceWidth::Sixteen, 0xABCD).unwrap());
        let mut state = ElementState::new();
        let mut segments = vec![Segment::new(SEGMENT_CAPACITY), Segment::new(SEGMENT_CAPACITY)];
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.put_u8(0);
            assert!(element.write(&mut state, index, segment));
        }
        assert_eq!(state.patches(), &[(0, 5), (1, 5)]);
        assert_eq!(segments[1].as_slice(), &[0, 0x08, 0x04, 0xAB, 0xCD, 0x01, 0x02]);

        element.post_process(&state, &mut segments);
        assert_eq!(segments[0].as_slice(), &[0, 0x08, 0x04, 0xAB, 0xCD, 0x02, 0x01]);
        assert_eq!(segments[1].as_slice()[5], 0x02);
        assert!(!element.is_complete(&state));
    }

    #[test]
    fn eight_bit_reference_must_fit() {
        assert_eq!(
            Concatenation::new(ReferenceWidth::Eight, 256),
            Err(UserDataError::ReferenceOutOfRange(256))
        );
        let concat = Concatenation::new(ReferenceWidth::Eight, 0x2A).unwrap();
        assert_eq!(concat.header(2, 0), vec![0x05, 0x00, 0x03, 0x2A, 0x02, 0x00]);
    }

    #[test]
    fn write_leaves_segment_untouched_without_room() {
        let element = HeaderElement::from(UserPromptIndicator { objects: 1 });
        let mut segment = Segment::new(2);
        let mut state = ElementState::new();
        assert!(!element.write(&mut state, 0, &mut segment));
        assert!(segment.is_empty());
        assert!(!element.is_complete(&state));

        let mut segment = Segment::new(3);
        assert!(element.write(&mut state, 0, &mut segment));
        assert!(element.is_complete(&state));
        state.reset();
        assert!(!element.is_complete(&state));
    }

    #[test]
    fn extended_object_streams_across_segments() {
        let object = ExtendedObject::new(ObjectFormat::IMelody, 7, vec![0x55; 20]).unwrap();
        let element = HeaderElement::from(object);
        assert_eq!(element.length(), 27);
        let mut state = ElementState::new();

        // Not enough room for the IE header plus the 7 octet object header
        let mut segment = Segment::new(8);
        assert!(!element.write(&mut state, 0, &mut segment));

        let mut first = Segment::new(12);
        assert!(element.write(&mut state, 0, &mut first));
        assert_eq!(first.len(), 12);
        assert_eq!(&first.as_slice()[..2], &[0x14, 10]);
        assert_eq!(state.cursor(), 10);
        assert!(!element.is_complete(&state));

        let mut second = Segment::new(SEGMENT_CAPACITY);
        assert!(element.write(&mut state, 1, &mut second));
        assert_eq!(second.as_slice()[1], 17);
        assert!(element.is_complete(&state));
    }
}
