// ABOUTME: SMPP data_coding values and the alphabet each one selects for segmentation
// ABOUTME: Maps wire bytes to character sizes so segment boundaries follow code units

use crate::encoding::Alphabet;
use std::fmt;

/// Data coding scheme carried in the data_coding field of message PDUs
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataCoding {
    /// SMSC Default Alphabet (GSM 7-bit)
    #[default]
    SmscDefault,
    /// IA5 (CCITT T.50)/ASCII encoding
    Ascii,
    /// 8-bit binary data
    Binary,
    /// Latin-1 (ISO-8859-1) character set
    Latin1,
    /// UCS-2 (ISO/IEC-10646) Unicode encoding
    Ucs2,
    /// GSM 7-bit default alphabet with message class
    Gsm7BitWithClass(MessageClass),
    /// 8-bit data with message class
    BinaryWithClass(MessageClass),
    /// Reserved or vendor-specific data coding value
    Custom(u8),
}

impl DataCoding {
    /// Creates a DataCoding from the raw wire value
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => DataCoding::SmscDefault,
            0x01 => DataCoding::Ascii,
            0x02 | 0x04 => DataCoding::Binary,
            0x03 => DataCoding::Latin1,
            0x08 => DataCoding::Ucs2,
            0xF0..=0xF3 => DataCoding::Gsm7BitWithClass(MessageClass::from_bits(value)),
            0xF4..=0xF7 => DataCoding::BinaryWithClass(MessageClass::from_bits(value)),
            _ => DataCoding::Custom(value),
        }
    }

    /// Returns the raw u8 value for wire protocol
    pub fn to_byte(&self) -> u8 {
        match self {
            DataCoding::SmscDefault => 0x00,
            DataCoding::Ascii => 0x01,
            DataCoding::Binary => 0x04,
            DataCoding::Latin1 => 0x03,
            DataCoding::Ucs2 => 0x08,
            DataCoding::Gsm7BitWithClass(class) => 0xF0 | *class as u8,
            DataCoding::BinaryWithClass(class) => 0xF4 | *class as u8,
            DataCoding::Custom(value) => *value,
        }
    }

    /// The alphabet used to encode, split and decode user data for this scheme.
    ///
    /// Unknown and reserved values are treated as opaque 8-bit data.
    pub fn alphabet(&self) -> Alphabet {
        match self {
            DataCoding::SmscDefault | DataCoding::Gsm7BitWithClass(_) => Alphabet::Gsm7Bit,
            DataCoding::Ascii | DataCoding::Latin1 => Alphabet::Latin1,
            DataCoding::Ucs2 => Alphabet::Ucs2,
            DataCoding::Binary | DataCoding::BinaryWithClass(_) | DataCoding::Custom(_) => {
                Alphabet::Binary
            }
        }
    }

    /// Returns the message class if this coding scheme includes one
    pub fn message_class(&self) -> Option<MessageClass> {
        match self {
            DataCoding::Gsm7BitWithClass(class) | DataCoding::BinaryWithClass(class) => {
                Some(*class)
            }
            _ => None,
        }
    }

    /// Returns the character set name for this encoding
    pub fn charset_name(&self) -> &'static str {
        match self {
            DataCoding::SmscDefault | DataCoding::Gsm7BitWithClass(_) => "GSM 7-bit Default",
            DataCoding::Ascii => "ASCII/IA5",
            DataCoding::Binary | DataCoding::BinaryWithClass(_) => "Binary",
            DataCoding::Latin1 => "ISO-8859-1",
            DataCoding::Ucs2 => "UCS-2",
            DataCoding::Custom(_) => "Custom/Reserved",
        }
    }
}

/// Message class for SMS delivery (low two bits of the 0xF0 coding group)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum MessageClass {
    /// Flash SMS (displayed immediately, not stored)
    Flash = 0,
    /// Mobile Equipment specific message
    MobileEquipment = 1,
    /// SIM-specific message (stored on SIM card)
    SimSpecific = 2,
    /// Terminal Equipment specific message
    TerminalEquipment = 3,
}

impl MessageClass {
    fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => MessageClass::Flash,
            1 => MessageClass::MobileEquipment,
            2 => MessageClass::SimSpecific,
            _ => MessageClass::TerminalEquipment,
        }
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.charset_name())?;
        if let Some(class) = self.message_class() {
            write!(f, " ({class:?})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataCoding({}, 0x{:02X})", self, self.to_byte())
    }
}

impl From<u8> for DataCoding {
    fn from(value: u8) -> Self {
        Self::from_byte(value)
    }
}

impl From<DataCoding> for u8 {
    fn from(data_coding: DataCoding) -> Self {
        data_coding.to_byte()
    }
}

impl From<Alphabet> for DataCoding {
    fn from(alphabet: Alphabet) -> Self {
        match alphabet {
            Alphabet::Gsm7Bit => DataCoding::SmscDefault,
            Alphabet::Latin1 => DataCoding::Latin1,
            Alphabet::Binary => DataCoding::Binary,
            Alphabet::Ucs2 => DataCoding::Ucs2,
        }
    }
}
