// ABOUTME: Packet stub for the message-carrying PDUs (submit_sm, deliver_sm, data_sm)
// ABOUTME: Exposes the short_message, esm_class, data_coding and optional parameter fields segmentation needs

use crate::datatypes::{Address, CommandId, DataCoding, EsmClass, Tag, TlvError, TlvTable};
use bytes::Bytes;

/// The view of a message PDU that segmentation writes and reassembly reads.
///
/// Session layers implement this for their own PDU types; [`SmPacket`] is the
/// implementation produced by this crate.
pub trait ShortMessagePacket {
    fn command_id(&self) -> CommandId;

    fn source(&self) -> &Address;

    fn destination(&self) -> &Address;

    fn esm_class(&self) -> EsmClass;

    fn data_coding(&self) -> DataCoding;

    /// Raw short_message octets. Always empty for data_sm.
    fn short_message(&self) -> &Bytes;

    fn tlvs(&self) -> &TlvTable;

    /// True when the user data starts with a User Data Header
    fn has_udh(&self) -> bool {
        self.esm_class().has_udhi()
    }

    /// The user data, wherever this packet carries it. message_payload
    /// takes precedence over short_message.
    fn user_data(&self) -> &Bytes {
        match self.tlvs().get_bytes(Tag::MessagePayload) {
            Some(payload) => payload,
            None => self.short_message(),
        }
    }
}

/// A message PDU reduced to the fields that matter for segmentation.
#[derive(Clone, Debug, PartialEq)]
pub struct SmPacket {
    pub command_id: CommandId,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub data_coding: DataCoding,
    pub short_message: Bytes,
    pub tlvs: TlvTable,
}

impl SmPacket {
    pub fn new(command_id: CommandId) -> Self {
        Self {
            command_id,
            source: Address::default(),
            destination: Address::default(),
            esm_class: EsmClass::default(),
            data_coding: DataCoding::default(),
            short_message: Bytes::new(),
            tlvs: TlvTable::new(),
        }
    }

    pub fn builder(command_id: CommandId) -> SmPacketBuilder {
        SmPacketBuilder {
            packet: Self::new(command_id),
        }
    }

    /// Places user data in short_message, or in message_payload for data_sm.
    pub fn set_user_data(&mut self, data: impl Into<Bytes>) -> Result<(), TlvError> {
        if self.command_id.has_short_message() {
            self.short_message = data.into();
            Ok(())
        } else {
            self.tlvs.set_bytes(Tag::MessagePayload, data)
        }
    }

    /// Sets the three SAR optional parameters.
    pub fn set_sar(&mut self, reference: u16, total: u8, sequence: u8) -> Result<(), TlvError> {
        self.tlvs.set_u16(Tag::SarMsgRefNum, reference)?;
        self.tlvs.set_u8(Tag::SarTotalSegments, total)?;
        self.tlvs.set_u8(Tag::SarSegmentSeqnum, sequence)
    }

    /// Returns `(reference, total, sequence)` when all three SAR parameters are present.
    pub fn sar(&self) -> Option<(u16, u8, u8)> {
        let reference = self.tlvs.get_u16(Tag::SarMsgRefNum).ok()?;
        let total = self.tlvs.get_u8(Tag::SarTotalSegments).ok()?;
        let sequence = self.tlvs.get_u8(Tag::SarSegmentSeqnum).ok()?;
        Some((reference, total, sequence))
    }
}

impl ShortMessagePacket for SmPacket {
    fn command_id(&self) -> CommandId {
        self.command_id
    }

    fn source(&self) -> &Address {
        &self.source
    }

    fn destination(&self) -> &Address {
        &self.destination
    }

    fn esm_class(&self) -> EsmClass {
        self.esm_class
    }

    fn data_coding(&self) -> DataCoding {
        self.data_coding
    }

    fn short_message(&self) -> &Bytes {
        &self.short_message
    }

    fn tlvs(&self) -> &TlvTable {
        &self.tlvs
    }
}

pub struct SmPacketBuilder {
    packet: SmPacket,
}

impl SmPacketBuilder {
    pub fn source(mut self, source: Address) -> Self {
        self.packet.source = source;
        self
    }

    pub fn destination(mut self, destination: Address) -> Self {
        self.packet.destination = destination;
        self
    }

    pub fn esm_class(mut self, esm_class: EsmClass) -> Self {
        self.packet.esm_class = esm_class;
        self
    }

    pub fn data_coding(mut self, data_coding: DataCoding) -> Self {
        self.packet.data_coding = data_coding;
        self
    }

    pub fn user_data(mut self, data: impl Into<Bytes>) -> Result<Self, TlvError> {
        self.packet.set_user_data(data)?;
        Ok(self)
    }

    pub fn build(self) -> SmPacket {
        self.packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_sm_carries_user_data_in_message_payload() {
        let packet = SmPacket::builder(CommandId::DataSm)
            .user_data(Bytes::from_static(b"payload"))
            .unwrap()
            .build();
        assert!(packet.short_message.is_empty());
        assert_eq!(
            packet.tlvs.get_bytes(Tag::MessagePayload).map(|b| &b[..]),
            Some(&b"payload"[..])
        );
        assert_eq!(&packet.user_data()[..], b"payload");
    }

    #[test]
    fn submit_sm_carries_user_data_in_short_message() {
        let packet = SmPacket::builder(CommandId::SubmitSm)
            .esm_class(EsmClass::default().with_udhi())
            .user_data(Bytes::from_static(b"hi"))
            .unwrap()
            .build();
        assert_eq!(&packet.user_data()[..], b"hi");
        assert!(packet.has_udh());
        assert!(!packet.tlvs.contains(Tag::MessagePayload));
    }

    #[test]
    fn sar_parameters_read_back() {
        let mut packet = SmPacket::new(CommandId::SubmitSm);
        assert_eq!(packet.sar(), None);
        packet.set_sar(0xBEEF, 3, 2).unwrap();
        assert_eq!(packet.sar(), Some((0xBEEF, 3, 2)));
    }
}
