// ABOUTME: SMPP optional parameters (TLVs) and a typed table for reading and writing them
// ABOUTME: Carries the SAR reassembly fields and message_payload for segmented messages

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::TryFromPrimitive;
use thiserror::Error;

/// Optional parameter tags used by the segmentation engine (SMPP 3.4 section 5.3.2)
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// 2-octet application port at the source
    SourcePort = 0x020A,
    /// 2-octet application port at the destination
    DestinationPort = 0x020B,
    /// 2-octet reference number shared by every segment of one message
    SarMsgRefNum = 0x020C,
    /// 1-octet total number of segments
    SarTotalSegments = 0x020E,
    /// 1-octet sequence number of this segment
    SarSegmentSeqnum = 0x020F,
    /// Opaque user data, up to 64K octets
    MessagePayload = 0x0424,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlvError {
    #[error("optional parameter {0:?} is not present")]
    Missing(Tag),

    #[error("optional parameter {tag:?} has length {actual}, expected {expected}")]
    SizeMismatch {
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    #[error("optional parameter value of {0} octets exceeds the 16-bit length field")]
    TooLong(usize),

    #[error("truncated optional parameter")]
    Truncated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Length field indicates the length of the Value field in octets.
    /// Note that this length does not include the length of the Tag and Length fields.
    pub length: u16,

    /// The Value field contains the actual data for the optional parameter in question.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: Tag, value: Bytes) -> Result<Self, TlvError> {
        let length = u16::try_from(value.len()).map_err(|_| TlvError::TooLong(value.len()))?;
        Ok(Self {
            tag: tag as u16,
            length,
            value,
        })
    }

    pub fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u16(self.tag);
        buffer.put_u16(self.length);
        buffer.extend_from_slice(&self.value);
    }

    /// Decodes one TLV from the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, TlvError> {
        if buf.remaining() < 4 {
            return Err(TlvError::Truncated);
        }
        let tag = buf.get_u16();
        let length = buf.get_u16();
        if buf.remaining() < length as usize {
            return Err(TlvError::Truncated);
        }
        let value = buf.copy_to_bytes(length as usize);
        Ok(Self { tag, length, value })
    }
}

/// Table of optional parameters attached to one packet.
///
/// Values are stored encoded, so typed getters check the stored length
/// against the size of the requested type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TlvTable {
    entries: Vec<Tlv>,
}

impl TlvTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// Sets a parameter, replacing any previous value for the same tag.
    pub fn set_bytes(&mut self, tag: Tag, value: impl Into<Bytes>) -> Result<(), TlvError> {
        let tlv = Tlv::new(tag, value.into())?;
        match self.entries.iter_mut().find(|entry| entry.tag == tag as u16) {
            Some(entry) => *entry = tlv,
            None => self.entries.push(tlv),
        }
        Ok(())
    }

    pub fn set_u8(&mut self, tag: Tag, value: u8) -> Result<(), TlvError> {
        self.set_bytes(tag, Bytes::copy_from_slice(&[value]))
    }

    pub fn set_u16(&mut self, tag: Tag, value: u16) -> Result<(), TlvError> {
        self.set_bytes(tag, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    pub fn get_bytes(&self, tag: Tag) -> Option<&Bytes> {
        self.find(tag).map(|tlv| &tlv.value)
    }

    pub fn get_u8(&self, tag: Tag) -> Result<u8, TlvError> {
        let value = self.fixed(tag, 1)?;
        Ok(value[0])
    }

    pub fn get_u16(&self, tag: Tag) -> Result<u16, TlvError> {
        let value = self.fixed(tag, 2)?;
        Ok(u16::from_be_bytes([value[0], value[1]]))
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Tlv> {
        let index = self.entries.iter().position(|tlv| tlv.tag == tag as u16)?;
        Some(self.entries.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tlv> {
        self.entries.iter()
    }

    /// Encodes every parameter in insertion order.
    pub fn to_bytes(&self) -> Bytes {
        let size = self.entries.iter().map(|tlv| 4 + tlv.value.len()).sum();
        let mut buffer = BytesMut::with_capacity(size);
        for tlv in &self.entries {
            tlv.encode(&mut buffer);
        }
        buffer.freeze()
    }

    /// Decodes the optional parameter section of a PDU body.
    ///
    /// Tags this table has no name for are kept so that re-encoding is lossless.
    pub fn decode(mut buf: impl Buf) -> Result<Self, TlvError> {
        let mut table = Self::new();
        while buf.has_remaining() {
            table.entries.push(Tlv::decode(&mut buf)?);
        }
        Ok(table)
    }

    fn find(&self, tag: Tag) -> Option<&Tlv> {
        self.entries.iter().find(|tlv| tlv.tag == tag as u16)
    }

    fn fixed(&self, tag: Tag, expected: usize) -> Result<&Bytes, TlvError> {
        let value = self.get_bytes(tag).ok_or(TlvError::Missing(tag))?;
        if value.len() != expected {
            return Err(TlvError::SizeMismatch {
                tag,
                expected,
                actual: value.len(),
            });
        }
        Ok(value)
    }
}
