// ABOUTME: Logical messages and the segmenter that turns one into SMPP packets
// ABOUTME: Splits on character boundaries and carries reassembly data as inline UDH or SAR parameters

pub mod assembler;

pub use assembler::{AssemblerConfig, AssemblyError, Delivery, MessageAssembler, ReassemblyKey};

use crate::datatypes::{CommandId, Tag, TlvError};
use crate::encoding::{Alphabet, EncodingError, gsm7};
use crate::gsm::{Concatenation, ReferenceWidth, SEGMENT_CAPACITY, UserDataError};
use crate::pdu::SmPacket;
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("segment size of {0} octets cannot hold a single character")]
    SegmentSizeTooSmall(usize),

    #[error("message needs {0} segments, at most 255 can be sent")]
    TooManySegments(usize),

    #[error("{0:?} has no short_message field to carry a user data header")]
    UdhNotSupported(CommandId),

    #[error(transparent)]
    UserData(#[from] UserDataError),

    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// What a logical message carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Bytes),
}

/// A message as the application sees it, before segmentation or after reassembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalMessage {
    alphabet: Alphabet,
    content: Content,
    capacity: Option<usize>,
}

impl LogicalMessage {
    /// Text to be sent in a text alphabet
    pub fn text(alphabet: Alphabet, text: impl Into<String>) -> Self {
        Self {
            alphabet,
            content: Content::Text(text.into()),
            capacity: None,
        }
    }

    /// Raw octets, sent with the binary alphabet
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            alphabet: Alphabet::Binary,
            content: Content::Binary(data.into()),
            capacity: None,
        }
    }

    /// Overrides the configured segment capacity for this message, in octets
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    /// Code units in the message alphabet; GSM text gives one septet per octet.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        match &self.content {
            Content::Text(text) => self.alphabet.encode(text),
            Content::Binary(data) => Ok(data.to_vec()),
        }
    }
}

/// Where reassembly information travels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// A concatenation element at the start of short_message, with UDHI set
    #[default]
    Udh,
    /// sar_* optional parameters, with the payload in message_payload
    Sar,
}

/// Segmentation settings.
///
/// # Example
///
/// ```rust
/// use smpp_concat::message::SegmentationConfig;
/// use smpp_concat::gsm::ReferenceWidth;
///
/// let config = SegmentationConfig::default()
///     .with_segment_size(160)
///     .with_reference_width(ReferenceWidth::Sixteen)
///     .with_first_sequence_number(1);
/// assert_eq!(config.udh_capacity, 140);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationConfig {
    /// Octets of payload per SAR segment (default: 254)
    pub segment_size: usize,

    /// Octets per segment, header included, for the UDH scheme (default: 140)
    pub udh_capacity: usize,

    /// Concatenation reference width for the UDH scheme (default: 8-bit)
    pub reference_width: ReferenceWidth,

    /// Sequence number of the first segment (default: 0)
    ///
    /// SMPP 3.4 and GSM 23.040 number segments from 1; many SMSCs accept 0.
    pub first_sequence_number: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            segment_size: 254,
            udh_capacity: SEGMENT_CAPACITY,
            reference_width: ReferenceWidth::Eight,
            first_sequence_number: 0,
        }
    }
}

impl SegmentationConfig {
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    pub fn with_udh_capacity(mut self, udh_capacity: usize) -> Self {
        self.udh_capacity = udh_capacity;
        self
    }

    pub fn with_reference_width(mut self, reference_width: ReferenceWidth) -> Self {
        self.reference_width = reference_width;
        self
    }

    pub fn with_first_sequence_number(mut self, first_sequence_number: u8) -> Self {
        self.first_sequence_number = first_sequence_number;
        self
    }
}

/// Splits logical messages into packets.
///
/// Reference numbers come from the injected random number generator.
pub struct MessageSegmenter<R> {
    config: SegmentationConfig,
    rng: R,
}

impl<R: Rng> MessageSegmenter<R> {
    pub fn new(rng: R) -> Self {
        Self::with_config(SegmentationConfig::default(), rng)
    }

    pub fn with_config(config: SegmentationConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Builds the packets for `message`, copying everything else from `template`.
    ///
    /// A message that fits in one segment produces one packet with no
    /// reassembly information. Otherwise every packet carries the same
    /// reference number, the total and its own sequence number.
    pub fn segment(
        &mut self,
        message: &LogicalMessage,
        scheme: Scheme,
        template: &SmPacket,
    ) -> Result<Vec<SmPacket>, MessageError> {
        if scheme == Scheme::Udh && !template.command_id.has_short_message() {
            return Err(MessageError::UdhNotSupported(template.command_id));
        }
        let alphabet = message.alphabet();
        let units = message.encode()?;
        let capacity = message.capacity().unwrap_or(match scheme {
            Scheme::Udh => self.config.udh_capacity,
            Scheme::Sar => self.config.segment_size,
        });

        let mut base = template.clone();
        if base.data_coding.alphabet() != alphabet {
            base.data_coding = alphabet.into();
        }

        if fits(alphabet, &units, 0, capacity) {
            let payload = encode_units(alphabet, &units, 0);
            match scheme {
                Scheme::Udh => base.set_user_data(payload)?,
                Scheme::Sar => base.tlvs.set_bytes(Tag::MessagePayload, payload)?,
            }
            return Ok(vec![base]);
        }

        match scheme {
            Scheme::Sar => self.segment_sar(alphabet, &units, capacity, base),
            Scheme::Udh => self.segment_udh(alphabet, &units, capacity, base),
        }
    }

    fn segment_sar(
        &mut self,
        alphabet: Alphabet,
        units: &[u8],
        capacity: usize,
        base: SmPacket,
    ) -> Result<Vec<SmPacket>, MessageError> {
        let chunks = split(alphabet, units, 0, capacity)?;
        let total = self.total(chunks.len())?;
        let reference: u16 = self.rng.r#gen();
        debug!(
            reference,
            total,
            ?alphabet,
            "segmenting message with SAR parameters"
        );

        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| -> Result<SmPacket, MessageError> {
                let mut packet = base.clone();
                packet.short_message = Bytes::new();
                packet.tlvs.set_bytes(
                    Tag::MessagePayload,
                    encode_units(alphabet, chunk, 0),
                )?;
                packet.set_sar(reference, total, self.sequence(i))?;
                Ok(packet)
            })
            .collect()
    }

    fn segment_udh(
        &mut self,
        alphabet: Alphabet,
        units: &[u8],
        capacity: usize,
        base: SmPacket,
    ) -> Result<Vec<SmPacket>, MessageError> {
        let concat = Concatenation::random(self.config.reference_width, &mut self.rng);
        let header_len = concat.header(0, 0).len();
        if capacity <= header_len {
            return Err(MessageError::SegmentSizeTooSmall(capacity));
        }
        let chunks = split(alphabet, units, header_len, capacity)?;
        let fill = gsm7::fill_bits(header_len);
        let total = self.total(chunks.len())?;
        debug!(
            reference = concat.reference(),
            total,
            ?alphabet,
            "segmenting message with concatenation header"
        );

        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| -> Result<SmPacket, MessageError> {
                let header = concat.header(total, self.sequence(i));
                let body = encode_units(alphabet, chunk, fill);
                let mut user_data = BytesMut::with_capacity(header.len() + body.len());
                user_data.put_slice(&header);
                user_data.put_slice(&body);

                let mut packet = base.clone();
                packet.esm_class.set_udhi(true);
                packet.set_user_data(user_data.freeze())?;
                Ok(packet)
            })
            .collect()
    }

    fn total(&self, segments: usize) -> Result<u8, MessageError> {
        let last = self.config.first_sequence_number as usize + segments - 1;
        if segments > u8::MAX as usize || last > u8::MAX as usize {
            return Err(MessageError::TooManySegments(segments));
        }
        Ok(segments as u8)
    }

    fn sequence(&self, index: usize) -> u8 {
        self.config.first_sequence_number + index as u8
    }
}

/// Whether `units` fit in the `octets` left after a header and read back
/// unchanged. GSM text is packed after `fill` bits.
fn fits(alphabet: Alphabet, units: &[u8], fill: usize, octets: usize) -> bool {
    match alphabet {
        Alphabet::Gsm7Bit => {
            let packed = gsm7::pack(units, fill);
            packed.len() <= octets && gsm7::unpack(&packed, fill) == units
        }
        _ => units.len() <= octets,
    }
}

/// Code units that fit in `capacity` octets after a header of `header_len` octets.
fn unit_capacity(alphabet: Alphabet, capacity: usize, header_len: usize) -> usize {
    let octets = capacity.saturating_sub(header_len);
    match alphabet {
        Alphabet::Gsm7Bit => gsm7::septet_capacity(capacity, header_len),
        // Whole code units only; a spare octet is left empty
        Alphabet::Ucs2 => octets & !1,
        Alphabet::Latin1 | Alphabet::Binary => octets,
    }
}

/// Splits `units` into chunks that fit in `capacity` octets after a header
/// of `header_len` octets. A GSM chunk is shortened when its packed form
/// would overflow or lose a trailing CR.
fn split<'a>(
    alphabet: Alphabet,
    units: &'a [u8],
    header_len: usize,
    capacity: usize,
) -> Result<Vec<&'a [u8]>, MessageError> {
    let max = unit_capacity(alphabet, capacity, header_len);
    let fill = gsm7::fill_bits(header_len);
    let octets = capacity.saturating_sub(header_len);
    let mut chunks = Vec::new();
    let mut rest = units;
    while !rest.is_empty() {
        let mut point = alphabet.split_point(rest, max);
        while point > 0 && !fits(alphabet, &rest[..point], fill, octets) {
            point = alphabet.split_point(rest, point - 1);
        }
        if point == 0 {
            return Err(MessageError::SegmentSizeTooSmall(capacity));
        }
        let (chunk, tail) = rest.split_at(point);
        chunks.push(chunk);
        rest = tail;
    }
    Ok(chunks)
}

/// Wire form of code units: GSM septets are packed after `fill` bits.
fn encode_units(alphabet: Alphabet, units: &[u8], fill: usize) -> Bytes {
    match alphabet {
        Alphabet::Gsm7Bit => Bytes::from(gsm7::pack(units, fill)),
        _ => Bytes::copy_from_slice(units),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{DataCoding, Tag};
    use crate::pdu::ShortMessagePacket;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn segmenter() -> MessageSegmenter<StdRng> {
        MessageSegmenter::new(StdRng::seed_from_u64(42))
    }

    #[test]
    fn short_message_is_one_plain_packet() {
        let message = LogicalMessage::text(Alphabet::Latin1, "I am a short message.");
        for (scheme, command_id) in [
            (Scheme::Udh, CommandId::SubmitSm),
            (Scheme::Sar, CommandId::DeliverSm),
            (Scheme::Sar, CommandId::DataSm),
        ] {
            let packets = segmenter()
                .segment(&message, scheme, &SmPacket::new(command_id))
                .unwrap();
            assert_eq!(packets.len(), 1);
            assert!(!packets[0].esm_class.has_udhi());
            assert_eq!(packets[0].sar(), None);
            assert_eq!(&packets[0].user_data()[..], b"I am a short message.");
            assert_eq!(packets[0].data_coding, DataCoding::Latin1);
        }
    }

    #[test]
    fn gsm_text_is_packed() {
        let message = LogicalMessage::text(Alphabet::Gsm7Bit, "hellohello");
        let packets = segmenter()
            .segment(&message, Scheme::Udh, &SmPacket::new(CommandId::SubmitSm))
            .unwrap();
        assert_eq!(
            &packets[0].short_message[..],
            &[0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37]
        );
        assert_eq!(packets[0].data_coding, DataCoding::SmscDefault);
    }

    #[test]
    fn gsm_udh_segments_hold_153_septets() {
        let text = "a".repeat(200);
        let message = LogicalMessage::text(Alphabet::Gsm7Bit, text);
        let packets = segmenter()
            .segment(&message, Scheme::Udh, &SmPacket::new(CommandId::SubmitSm))
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].short_message.len(), 140);
        // 47 septets plus one fill bit after the 6 octet header
        assert_eq!(packets[1].short_message.len(), 6 + (47 * 7 + 1usize).div_ceil(8));
    }

    #[test]
    fn gsm_escape_pairs_stay_together() {
        // 152 plain characters, then a two septet euro sign
        let text = format!("{}\u{20ac}end", "x".repeat(152));
        let message = LogicalMessage::text(Alphabet::Gsm7Bit, text);
        let packets = segmenter()
            .segment(&message, Scheme::Udh, &SmPacket::new(CommandId::SubmitSm))
            .unwrap();
        assert_eq!(packets.len(), 2);
        let first = gsm7::unpack(&packets[0].short_message[6..], 1);
        assert_eq!(first.len(), 152);
    }

    #[test]
    fn sixteen_bit_reference_header() {
        let config = SegmentationConfig::default()
            .with_reference_width(ReferenceWidth::Sixteen)
            .with_first_sequence_number(1);
        let mut segmenter = MessageSegmenter::with_config(config, StdRng::seed_from_u64(1));
        let message = LogicalMessage::binary(vec![0xAB; 200]);
        let packets = segmenter
            .segment(&message, Scheme::Udh, &SmPacket::new(CommandId::SubmitSm))
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].short_message.len(), 140);
        assert_eq!(&packets[0].short_message[..3], &[0x06, 0x08, 0x04]);
        assert_eq!(&packets[1].short_message[5..7], &[2, 2]);
        assert_eq!(packets[1].short_message.len(), 7 + 200 - 133);
    }

    #[test]
    fn data_sm_cannot_use_udh() {
        let message = LogicalMessage::binary(vec![0; 10]);
        assert_eq!(
            segmenter().segment(&message, Scheme::Udh, &SmPacket::new(CommandId::DataSm)),
            Err(MessageError::UdhNotSupported(CommandId::DataSm))
        );
    }

    #[test]
    fn sar_keeps_template_fields() {
        let mut template = SmPacket::new(CommandId::SubmitSm);
        template.tlvs.set_u16(Tag::DestinationPort, 5000).unwrap();
        template.data_coding = DataCoding::Gsm7BitWithClass(crate::datatypes::MessageClass::Flash);
        let message = LogicalMessage::text(Alphabet::Gsm7Bit, "z".repeat(300)).with_capacity(100);
        let packets = segmenter().segment(&message, Scheme::Sar, &template).unwrap();
        // 114 septets fit in 100 octets
        assert_eq!(packets.len(), 3);
        for packet in &packets {
            assert_eq!(packet.tlvs.get_u16(Tag::DestinationPort), Ok(5000));
            assert_eq!(packet.data_coding, template.data_coding);
            assert!(packet.short_message.is_empty());
        }
    }

    #[test]
    fn rejects_impossible_sizes() {
        let message = LogicalMessage::text(Alphabet::Ucs2, "abc").with_capacity(1);
        assert_eq!(
            segmenter().segment(&message, Scheme::Sar, &SmPacket::new(CommandId::SubmitSm)),
            Err(MessageError::SegmentSizeTooSmall(1))
        );

        let message = LogicalMessage::binary(vec![0; 300]).with_capacity(6);
        assert_eq!(
            segmenter().segment(&message, Scheme::Udh, &SmPacket::new(CommandId::SubmitSm)),
            Err(MessageError::SegmentSizeTooSmall(6))
        );

        let message = LogicalMessage::binary(vec![0; 256]).with_capacity(1);
        assert_eq!(
            segmenter().segment(&message, Scheme::Sar, &SmPacket::new(CommandId::SubmitSm)),
            Err(MessageError::TooManySegments(256))
        );
    }

    #[test]
    fn unmappable_text_is_an_error() {
        let message = LogicalMessage::text(Alphabet::Gsm7Bit, "\u{4e16}");
        assert!(matches!(
            segmenter().segment(&message, Scheme::Sar, &SmPacket::new(CommandId::SubmitSm)),
            Err(MessageError::Encoding(EncodingError::Unmappable { .. }))
        ));
    }
}
