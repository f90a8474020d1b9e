// ABOUTME: Packs header elements and a payload into 140 octet segments, concatenating when needed
// ABOUTME: Turns the segments into submit_sm, deliver_sm or data_sm packets with the UDHI bit set

use crate::datatypes::{Address, CommandId, DataCoding, EsmClass};
use crate::gsm::element::{
    Concatenation, ElementState, HeaderElement, ReferenceWidth, SEGMENT_CAPACITY, Segment,
};
use crate::gsm::UserDataError;
use crate::pdu::SmPacket;
use bytes::Bytes;
use rand::Rng;
use tracing::debug;

/// Most segments one concatenated message can have
pub const MAX_SEGMENTS: usize = 255;

/// User data for one message: a payload and the header elements that go with it.
///
/// The value itself is never modified by segmentation, so one `UserData` can
/// be segmented any number of times, each run with a fresh reference number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserData {
    elements: Vec<HeaderElement>,
    data: Bytes,
    reference_width: ReferenceWidth,
    data_coding: DataCoding,
}

impl UserData {
    pub fn new() -> Self {
        Self {
            data_coding: DataCoding::Binary,
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Width of the concatenation reference used when the data needs more than one segment
    pub fn with_reference_width(mut self, width: ReferenceWidth) -> Self {
        self.reference_width = width;
        self
    }

    /// data_coding set on packets built from this user data
    pub fn with_data_coding(mut self, data_coding: DataCoding) -> Self {
        self.data_coding = data_coding;
        self
    }

    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn elements(&self) -> &[HeaderElement] {
        &self.elements
    }

    /// Adds an element, keeping recurring elements ahead of the others.
    ///
    /// Concatenation is always synthesised and cannot be added by hand.
    /// Compressed data must already be compressed.
    pub fn add_header_element(
        &mut self,
        element: impl Into<HeaderElement>,
    ) -> Result<(), UserDataError> {
        let element = element.into();
        match &element {
            HeaderElement::Concatenation(_) => return Err(UserDataError::ConcatenationNotAllowed),
            HeaderElement::CompressedData(compressed) if !compressed.is_compressed() => {
                return Err(UserDataError::NotCompressed);
            }
            _ => {}
        }
        self.elements.push(element);
        // stable, so insertion order holds within each group
        self.elements.sort_by_key(|element| !element.is_recurring());
        Ok(())
    }

    /// Octets needed to send everything in one segment.
    pub fn encoded_len(&self) -> usize {
        let header = if self.elements.is_empty() {
            0
        } else {
            1 + self
                .elements
                .iter()
                .map(|element| element.length() + 2)
                .sum::<usize>()
        };
        header + self.data.len()
    }

    pub fn is_multi_message(&self) -> bool {
        self.encoded_len() > SEGMENT_CAPACITY
    }

    /// True when the segments will start with a User Data Header
    pub fn has_header(&self) -> bool {
        !self.elements.is_empty() || self.is_multi_message()
    }

    /// The data as a single SMS user data field.
    pub fn to_single_sms(&self) -> Result<Bytes, UserDataError> {
        if self.is_multi_message() {
            // The reference number has no effect on the segment count
            let concat = Concatenation::new(self.reference_width, 0)?;
            let segments = self.write_segments(&self.with_concatenation(concat))?;
            return Err(UserDataError::MultipleSegments(segments.len()));
        }
        let mut segments = self.write_segments(&self.elements)?;
        Ok(segments.remove(0))
    }

    /// Splits the data into segments, each at most 140 octets.
    ///
    /// When concatenation is needed a concatenation element with a reference
    /// drawn from `rng` is placed ahead of every other element.
    pub fn to_segments(&self, rng: &mut impl Rng) -> Result<Vec<Bytes>, UserDataError> {
        if !self.is_multi_message() {
            return self.write_segments(&self.elements);
        }
        debug!(
            size = self.encoded_len(),
            elements = self.elements.len(),
            "user data needs concatenation"
        );
        let concat = Concatenation::random(self.reference_width, rng);
        self.write_segments(&self.with_concatenation(concat))
    }

    /// Segments wrapped in packets ready for the session layer.
    ///
    /// submit_sm and deliver_sm carry each segment in short_message, data_sm
    /// in message_payload. UDHI is set whenever segments carry a header.
    pub fn to_packets(
        &self,
        command_id: CommandId,
        source: &Address,
        destination: &Address,
        rng: &mut impl Rng,
    ) -> Result<Vec<SmPacket>, UserDataError> {
        let mut esm_class = EsmClass::default();
        esm_class.set_udhi(self.has_header());
        self.to_segments(rng)?
            .into_iter()
            .map(|segment| -> Result<SmPacket, UserDataError> {
                Ok(SmPacket::builder(command_id)
                    .source(source.clone())
                    .destination(destination.clone())
                    .esm_class(esm_class)
                    .data_coding(self.data_coding)
                    .user_data(segment)?
                    .build())
            })
            .collect()
    }

    fn with_concatenation(&self, concat: Concatenation) -> Vec<HeaderElement> {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.push(HeaderElement::Concatenation(concat));
        elements.extend(self.elements.iter().cloned());
        elements
    }

    fn write_segments(&self, elements: &[HeaderElement]) -> Result<Vec<Bytes>, UserDataError> {
        let mut states = vec![ElementState::new(); elements.len()];
        let mut segments: Vec<Segment> = Vec::new();
        let mut payload = &self.data[..];
        let has_header = !elements.is_empty();

        loop {
            let index = segments.len();
            if index == MAX_SEGMENTS {
                return Err(UserDataError::TooManySegments(index + 1));
            }
            let mut segment = Segment::new(SEGMENT_CAPACITY);
            if has_header {
                segment.put_u8(0);
            }

            let mut progressed = false;
            for (element, state) in elements.iter().zip(states.iter_mut()) {
                if segment.remaining() < 2 {
                    break;
                }
                if element.is_recurring() || !element.is_complete(state) {
                    let before = segment.len();
                    if !element.write(state, index, &mut segment) {
                        break;
                    }
                    progressed |= !element.is_recurring() && segment.len() > before;
                }
            }
            if has_header {
                segment.set_u8(0, (segment.len() - 1) as u8);
            }

            let taken = segment.put_slice(payload);
            payload = &payload[taken..];
            progressed |= taken > 0;

            let pending = elements
                .iter()
                .zip(&states)
                .find(|(element, state)| !element.is_recurring() && !element.is_complete(state));
            segments.push(segment);

            match pending {
                None if payload.is_empty() => break,
                _ if !progressed => {
                    // Nothing pending means the recurring elements filled the segment
                    let stuck = pending.map(|(element, _)| element).or(elements.last());
                    let iei = stuck.map_or(0, HeaderElement::iei);
                    return Err(UserDataError::ElementTooLarge(iei));
                }
                _ => {}
            }
        }

        for (element, state) in elements.iter().zip(&states) {
            element.post_process(state, &mut segments);
        }
        debug!(segments = segments.len(), "user data segmented");
        Ok(segments.into_iter().map(Segment::into_bytes).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::Tag;
    use crate::gsm::element::{PortAddressing, UserPromptIndicator};
    use crate::gsm::ems::{Bitmap, CompressedData, ExtendedObject, ObjectFormat, Picture};
    use crate::gsm::udh::UserDataHeader;
    use crate::pdu::ShortMessagePacket;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn small_payload_is_one_segment_without_header() {
        let user_data = UserData::new().with_data(vec![0x41; 140]);
        assert!(!user_data.is_multi_message());
        let segments = user_data.to_segments(&mut rng()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 140);
        assert_eq!(segments[0][0], 0x41);
        assert_eq!(user_data.to_single_sms().unwrap(), segments[0]);
    }

    #[test]
    fn empty_payload_is_one_empty_segment() {
        let segments = UserData::new().to_segments(&mut rng()).unwrap();
        assert_eq!(segments, vec![Bytes::new()]);
    }

    #[test]
    fn long_payload_is_concatenated_and_patched() {
        let payload: Vec<u8> = (0..300).map(|i| i as u8).collect();
        let user_data = UserData::new().with_data(payload.clone());
        let segments = user_data.to_segments(&mut rng()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 140);
        assert_eq!(segments[1].len(), 140);
        assert_eq!(segments[2].len(), 6 + 300 - 2 * 134);

        let reference = segments[0][3];
        let mut rebuilt = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(&segment[..3], &[0x05, 0x00, 0x03]);
            assert_eq!(segment[3], reference);
            assert_eq!(segment[4], 3);
            assert_eq!(segment[5] as usize, i + 1);
            rebuilt.extend_from_slice(&segment[6..]);
        }
        assert_eq!(rebuilt, payload);
        assert!(matches!(
            user_data.to_single_sms(),
            Err(UserDataError::MultipleSegments(3))
        ));
    }

    #[test]
    fn sixteen_bit_reference_widens_header() {
        let user_data = UserData::new()
            .with_reference_width(ReferenceWidth::Sixteen)
            .with_data(vec![0; 200]);
        let segments = user_data.to_segments(&mut rng()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(&segments[0][..3], &[0x06, 0x08, 0x04]);
        assert_eq!(segments[0][5], 2);
        assert_eq!(segments[1][5], 2);
        assert_eq!(segments[1][6], 2);
    }

    #[test]
    fn recurring_ports_appear_in_every_segment() {
        let mut user_data = UserData::new().with_data(vec![0x20; 250]);
        user_data
            .add_header_element(UserPromptIndicator { objects: 1 })
            .unwrap();
        user_data
            .add_header_element(PortAddressing::sixteen_bit(0x158A, 0).unwrap())
            .unwrap();
        assert!(user_data.elements()[0].is_recurring());

        let segments = user_data.to_segments(&mut rng()).unwrap();
        assert_eq!(segments.len(), 2);
        let (first, _) = UserDataHeader::parse(&segments[0]).unwrap();
        let first_ieis: Vec<u8> = first.elements().iter().map(|ie| ie.iei).collect();
        assert_eq!(first_ieis, vec![0x00, 0x05, 0x13]);
        let (second, _) = UserDataHeader::parse(&segments[1]).unwrap();
        let second_ieis: Vec<u8> = second.elements().iter().map(|ie| ie.iei).collect();
        assert_eq!(second_ieis, vec![0x00, 0x05]);
    }

    #[test]
    fn concatenation_and_uncompressed_data_are_rejected() {
        let mut user_data = UserData::new();
        let concat = Concatenation::new(ReferenceWidth::Eight, 1).unwrap();
        assert_eq!(
            user_data.add_header_element(concat),
            Err(UserDataError::ConcatenationNotAllowed)
        );
        assert_eq!(
            user_data.add_header_element(CompressedData::new()),
            Err(UserDataError::NotCompressed)
        );
    }

    #[test]
    fn extended_object_streams_and_reassembles() {
        let object = ExtendedObject::new(ObjectFormat::BlackAndWhiteAnimation, 0, vec![0x3C; 300])
            .unwrap()
            .with_position(12);
        let mut user_data = UserData::new().with_data(&b"see the picture"[..]);
        user_data.add_header_element(object.clone()).unwrap();
        let segments = user_data.to_segments(&mut rng()).unwrap();
        assert_eq!(segments.len(), 3);

        let mut chunks = Vec::new();
        let mut text = Vec::new();
        for segment in &segments {
            assert!(segment.len() <= SEGMENT_CAPACITY);
            let (header, payload) = UserDataHeader::parse(segment).unwrap();
            chunks.extend(header.elements().iter().filter(|ie| ie.iei == 0x14).map(|ie| ie.data.clone()));
            text.extend_from_slice(&payload);
        }
        let rebuilt = ExtendedObject::from_chunks(chunks.iter().map(|chunk| &chunk[..])).unwrap();
        assert_eq!(rebuilt, object);
        assert_eq!(text, b"see the picture");
    }

    #[test]
    fn compressed_data_streams_across_segments() {
        let mut compressed = CompressedData::new();
        for reference in 0..4 {
            let data: Vec<u8> = (0..120).map(|i| (i % 7) as u8 * reference).collect();
            compressed.add(ExtendedObject::new(ObjectFormat::VCard, reference, data).unwrap());
        }
        compressed.compress().unwrap();
        let mut user_data = UserData::new();
        user_data.add_header_element(compressed.clone()).unwrap();

        let segments = user_data.to_segments(&mut rng()).unwrap();
        let chunks: Vec<Bytes> = segments
            .iter()
            .flat_map(|segment| {
                let (header, _) = UserDataHeader::parse(segment).unwrap();
                header
                    .elements()
                    .iter()
                    .filter(|ie| ie.iei == 0x16)
                    .map(|ie| ie.data.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        let rebuilt = CompressedData::from_chunks(chunks.iter().map(|chunk| &chunk[..])).unwrap();
        assert_eq!(rebuilt.objects(), compressed.objects());
    }

    #[test]
    fn element_that_never_fits_is_an_error() {
        let mut user_data = UserData::new().with_data(vec![0; 10]);
        user_data
            .add_header_element(PortAddressing::sixteen_bit(1, 2).unwrap())
            .unwrap();
        user_data
            .add_header_element(Picture::large(0, &Bitmap::new(32, 32)).unwrap())
            .unwrap();
        assert_eq!(
            user_data.to_segments(&mut rng()),
            Err(UserDataError::ElementTooLarge(0x10))
        );
    }

    #[test]
    fn too_many_segments_is_an_error() {
        let user_data = UserData::new().with_data(vec![0; 134 * 255 + 1]);
        assert_eq!(
            user_data.to_segments(&mut rng()),
            Err(UserDataError::TooManySegments(256))
        );
        let user_data = UserData::new().with_data(vec![0; 134 * 255]);
        assert_eq!(user_data.to_segments(&mut rng()).unwrap().len(), 255);
    }

    #[test]
    fn packets_carry_segments_and_udhi() {
        let source = Address::international("+353861234567").unwrap();
        let destination = Address::international("+353867654321").unwrap();
        let user_data = UserData::new().with_data(vec![0x61; 200]);

        let submits = user_data
            .to_packets(CommandId::SubmitSm, &source, &destination, &mut rng())
            .unwrap();
        assert_eq!(submits.len(), 2);
        for packet in &submits {
            assert!(packet.esm_class.has_udhi());
            assert_eq!(packet.source, source);
            assert_eq!(packet.data_coding, DataCoding::Binary);
            assert!(!packet.short_message.is_empty());
        }

        let data_sms = user_data
            .to_packets(CommandId::DataSm, &source, &destination, &mut rng())
            .unwrap();
        assert!(data_sms[0].short_message.is_empty());
        assert!(data_sms[0].tlvs.contains(Tag::MessagePayload));
        assert_eq!(data_sms[0].user_data(), &submits[0].short_message);

        let single = UserData::new()
            .with_data(&b"hi"[..])
            .to_packets(CommandId::DeliverSm, &source, &destination, &mut rng())
            .unwrap();
        assert!(!single[0].esm_class.has_udhi());
    }
}
