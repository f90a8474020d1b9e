// ABOUTME: Type of number (TON) carried with every SMPP address
// ABOUTME: Selects which characters an Address may contain

use num_enum::TryFromPrimitive;

/// The addr_ton field. Two addresses that differ only in TON are
/// different senders for reassembly purposes.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypeOfNumber {
    #[default]
    Unknown = 0x00,
    International = 0x01,
    National = 0x02,
    NetworkSpecific = 0x03,
    SubscriberNumber = 0x04,
    Alphanumeric = 0x05,
    Abbreviated = 0x06,
}
