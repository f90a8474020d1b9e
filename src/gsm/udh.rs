// ABOUTME: Parses a received User Data Header into its information elements
// ABOUTME: Extracts concatenation and port addressing details for reassembly

use crate::gsm::element::{Iei, ReferenceWidth};
use crate::gsm::UserDataError;
use bytes::Bytes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InformationElement {
    pub iei: u8,
    pub data: Bytes,
}

impl InformationElement {
    /// The identifier, if it is one this crate knows
    pub fn kind(&self) -> Option<Iei> {
        Iei::try_from(self.iei).ok()
    }
}

/// Concatenation details read from an IEI 0x00 or 0x08 element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConcatenationInfo {
    pub width: ReferenceWidth,
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserDataHeader {
    elements: Vec<InformationElement>,
}

impl UserDataHeader {
    /// Splits user data that starts with a header into the header and the
    /// payload that follows it.
    pub fn parse(user_data: &Bytes) -> Result<(Self, Bytes), UserDataError> {
        let length = *user_data
            .first()
            .ok_or(UserDataError::MalformedHeader("empty user data"))? as usize;
        if user_data.len() < 1 + length {
            return Err(UserDataError::MalformedHeader("header longer than user data"));
        }

        let mut elements = Vec::new();
        let mut offset = 1;
        while offset < 1 + length {
            if offset + 2 > 1 + length {
                return Err(UserDataError::MalformedHeader("element header truncated"));
            }
            let iei = user_data[offset];
            let size = user_data[offset + 1] as usize;
            let start = offset + 2;
            if start + size > 1 + length {
                return Err(UserDataError::MalformedHeader("element data truncated"));
            }
            elements.push(InformationElement {
                iei,
                data: user_data.slice(start..start + size),
            });
            offset = start + size;
        }
        Ok((Self { elements }, user_data.slice(1 + length..)))
    }

    pub fn elements(&self) -> &[InformationElement] {
        &self.elements
    }

    /// Encoded size including the length octet
    pub fn encoded_len(&self) -> usize {
        1 + self
            .elements
            .iter()
            .map(|element| 2 + element.data.len())
            .sum::<usize>()
    }

    pub fn find(&self, iei: Iei) -> impl Iterator<Item = &InformationElement> {
        self.elements
            .iter()
            .filter(move |element| element.iei == iei as u8)
    }

    /// The concatenation element, if any. Malformed data is an error rather
    /// than a missing element.
    pub fn concatenation(&self) -> Result<Option<ConcatenationInfo>, UserDataError> {
        for element in &self.elements {
            let info = match (element.kind(), &element.data[..]) {
                (Some(Iei::Concatenated8Bit), &[reference, total, sequence]) => ConcatenationInfo {
                    width: ReferenceWidth::Eight,
                    reference: reference as u16,
                    total,
                    sequence,
                },
                (Some(Iei::Concatenated16Bit), &[high, low, total, sequence]) => {
                    ConcatenationInfo {
                        width: ReferenceWidth::Sixteen,
                        reference: u16::from_be_bytes([high, low]),
                        total,
                        sequence,
                    }
                }
                (Some(Iei::Concatenated8Bit | Iei::Concatenated16Bit), _) => {
                    return Err(UserDataError::MalformedHeader("bad concatenation element"));
                }
                _ => continue,
            };
            return Ok(Some(info));
        }
        Ok(None)
    }

    /// `(destination, source)` application ports, if any
    pub fn ports(&self) -> Option<(u16, u16)> {
        self.elements
            .iter()
            .find_map(|element| match (element.kind(), &element.data[..]) {
                (Some(Iei::ApplicationPort8Bit), &[destination, source]) => {
                    Some((destination as u16, source as u16))
                }
                (Some(Iei::ApplicationPort16Bit), &[dh, dl, sh, sl]) => Some((
                    u16::from_be_bytes([dh, dl]),
                    u16::from_be_bytes([sh, sl]),
                )),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_concatenation_and_payload() {
        let data = Bytes::from_static(&[0x05, 0x00, 0x03, 0x2A, 0x02, 0x01, b'h', b'i']);
        let (header, payload) = UserDataHeader::parse(&data).unwrap();
        assert_eq!(&payload[..], b"hi");
        assert_eq!(header.encoded_len(), 6);
        assert_eq!(
            header.concatenation().unwrap(),
            Some(ConcatenationInfo {
                width: ReferenceWidth::Eight,
                reference: 0x2A,
                total: 2,
                sequence: 1
            })
        );
        assert_eq!(header.ports(), None);
    }

    #[test]
    fn parses_sixteen_bit_reference_and_ports() {
        let data = Bytes::from_static(&[
            0x0C, 0x05, 0x04, 0x15, 0x8A, 0x00, 0x00, 0x08, 0x04, 0x12, 0x34, 0x03, 0x01,
        ]);
        let (header, payload) = UserDataHeader::parse(&data).unwrap();
        assert!(payload.is_empty());
        assert_eq!(header.elements().len(), 2);
        assert_eq!(header.ports(), Some((0x158A, 0)));
        let info = header.concatenation().unwrap().unwrap();
        assert_eq!(info.width, ReferenceWidth::Sixteen);
        assert_eq!(info.reference, 0x1234);
        assert_eq!((info.total, info.sequence), (3, 1));
    }

    #[test]
    fn keeps_unknown_elements() {
        let data = Bytes::from_static(&[0x03, 0x70, 0x01, 0xFF, b'x']);
        let (header, _) = UserDataHeader::parse(&data).unwrap();
        assert_eq!(header.elements()[0].kind(), None);
        assert_eq!(header.concatenation(), Ok(None));
    }

    #[test]
    fn rejects_truncated_headers() {
        for data in [
            &[][..],
            &[0x06, 0x00, 0x03][..],
            &[0x02, 0x00, 0x03, 0x01][..],
            &[0x01, 0x00][..],
        ] {
            assert!(UserDataHeader::parse(&Bytes::copy_from_slice(data)).is_err());
        }
        let data = Bytes::from_static(&[0x04, 0x00, 0x02, 0x01, 0x02]);
        let (header, _) = UserDataHeader::parse(&data).unwrap();
        assert!(header.concatenation().is_err());
    }
}
