// ABOUTME: SMPP esm_class bitfield with messaging mode, message type and GSM feature bits
// ABOUTME: Segmentation sets the UDHI bit here whenever user data carries a header

use std::fmt;

/// esm_class bitfield (SMPP 3.4 section 5.2.12).
///
/// Bits 1-0 hold the messaging mode, bits 5-2 the message type and bits 7-6
/// the GSM network specific features (UDHI and reply path).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EsmClass {
    message_mode: MessageMode,
    message_type: u8,
    udhi: bool,
    reply_path: bool,
}

impl EsmClass {
    const UDHI: u8 = 0x40;
    const REPLY_PATH: u8 = 0x80;

    /// Creates an ESM class with the given messaging mode and default type
    pub fn new(message_mode: MessageMode) -> Self {
        Self {
            message_mode,
            ..Self::default()
        }
    }

    /// Creates an ESM class for datagram mode
    pub fn datagram() -> Self {
        Self::new(MessageMode::Datagram)
    }

    /// Creates an ESM class for store and forward mode
    pub fn store_and_forward() -> Self {
        Self::new(MessageMode::StoreAndForward)
    }

    /// Adds UDHI (User Data Header Indicator) feature
    pub fn with_udhi(mut self) -> Self {
        self.udhi = true;
        self
    }

    /// Adds reply path feature
    pub fn with_reply_path(mut self) -> Self {
        self.reply_path = true;
        self
    }

    /// Sets or clears the UDHI bit in place
    pub fn set_udhi(&mut self, udhi: bool) {
        self.udhi = udhi;
    }

    pub fn message_mode(&self) -> MessageMode {
        self.message_mode
    }

    /// Message type bits 5-2, shifted down
    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    /// Returns true if UDHI (User Data Header Indicator) is set
    pub fn has_udhi(&self) -> bool {
        self.udhi
    }

    pub fn has_reply_path(&self) -> bool {
        self.reply_path
    }

    /// Converts to the raw u8 value for wire protocol
    pub fn to_byte(&self) -> u8 {
        let mut value = self.message_mode as u8 | (self.message_type & 0x0F) << 2;
        if self.udhi {
            value |= Self::UDHI;
        }
        if self.reply_path {
            value |= Self::REPLY_PATH;
        }
        value
    }

    /// Creates an ESM class from a raw u8 value. Every bit pattern is valid.
    pub fn from_byte(value: u8) -> Self {
        Self {
            message_mode: MessageMode::from_bits(value),
            message_type: (value >> 2) & 0x0F,
            udhi: value & Self::UDHI != 0,
            reply_path: value & Self::REPLY_PATH != 0,
        }
    }
}

/// Messaging modes (bits 1-0)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum MessageMode {
    /// Default SMSC mode (usually store and forward)
    #[default]
    Default = 0b00,
    /// Datagram mode
    Datagram = 0b01,
    /// Forward (transaction) mode
    Forward = 0b10,
    /// Store and forward mode (explicit)
    StoreAndForward = 0b11,
}

impl MessageMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => MessageMode::Default,
            0b01 => MessageMode::Datagram,
            0b10 => MessageMode::Forward,
            _ => MessageMode::StoreAndForward,
        }
    }
}

impl fmt::Debug for EsmClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsmClass")
            .field("message_mode", &self.message_mode)
            .field("message_type", &self.message_type)
            .field("udhi", &self.udhi)
            .field("reply_path", &self.reply_path)
            .field("byte_value", &format!("0x{:02X}", self.to_byte()))
            .finish()
    }
}

impl From<u8> for EsmClass {
    fn from(value: u8) -> Self {
        Self::from_byte(value)
    }
}

impl From<EsmClass> for u8 {
    fn from(esm_class: EsmClass) -> Self {
        esm_class.to_byte()
    }
}
