// ABOUTME: SMPP source/destination address with TON/NPI and length validation
// ABOUTME: Used on packets and as part of the key that identifies a message under reassembly

use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use std::fmt;
use thiserror::Error;

/// Maximum address length in octets, excluding the C-string terminator
pub const MAX_ADDRESS_LENGTH: usize = 20;

/// An SMPP address: type of number, numbering plan and the address digits.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    ton: TypeOfNumber,
    npi: NumericPlanIndicator,
    address: String,
}

impl Address {
    /// Creates a new address, validating its format against the TON
    pub fn new(
        ton: TypeOfNumber,
        npi: NumericPlanIndicator,
        address: &str,
    ) -> Result<Self, AddressError> {
        if address.len() > MAX_ADDRESS_LENGTH {
            return Err(AddressError::TooLong {
                max_len: MAX_ADDRESS_LENGTH,
                actual_len: address.len(),
            });
        }

        let valid = match ton {
            TypeOfNumber::International => address
                .chars()
                .enumerate()
                .all(|(i, c)| c.is_ascii_digit() || (i == 0 && c == '+')),
            TypeOfNumber::National
            | TypeOfNumber::NetworkSpecific
            | TypeOfNumber::SubscriberNumber => address.chars().all(|c| c.is_ascii_digit()),
            TypeOfNumber::Alphanumeric | TypeOfNumber::Abbreviated => address
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' '),
            TypeOfNumber::Unknown => address.chars().all(|c| c.is_ascii() && !c.is_control()),
        };
        if !valid {
            return Err(AddressError::InvalidFormat {
                ton,
                address: address.to_string(),
            });
        }

        Ok(Self {
            ton,
            npi,
            address: address.to_string(),
        })
    }

    /// Creates an address from the raw addr_ton and addr_npi octets of a
    /// received PDU.
    pub fn from_raw(ton: u8, npi: u8, address: &str) -> Result<Self, AddressError> {
        let ton = TypeOfNumber::try_from(ton).map_err(|_| AddressError::UnknownTon(ton))?;
        let npi = NumericPlanIndicator::try_from(npi).map_err(|_| AddressError::UnknownNpi(npi))?;
        Self::new(ton, npi, address)
    }

    /// International ISDN number, e.g. `+353861234567`
    pub fn international(address: &str) -> Result<Self, AddressError> {
        Self::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, address)
    }

    /// Address with unknown TON/NPI
    pub fn unknown(address: &str) -> Result<Self, AddressError> {
        Self::new(TypeOfNumber::Unknown, NumericPlanIndicator::Unknown, address)
    }

    pub fn ton(&self) -> TypeOfNumber {
        self.ton
    }

    pub fn npi(&self) -> NumericPlanIndicator {
        self.npi
    }

    pub fn as_str(&self) -> &str {
        &self.address
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }
}

/// Errors that can occur when creating addresses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address too long: {actual_len} bytes (max {max_len})")]
    TooLong { max_len: usize, actual_len: usize },

    #[error("Invalid address format for {ton:?}: {address}")]
    InvalidFormat { ton: TypeOfNumber, address: String },

    #[error("Unknown type of number: {0:#04x}")]
    UnknownTon(u8),

    #[error("Unknown numbering plan indicator: {0:#04x}")]
    UnknownNpi(u8),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address({:?}/{:?} \"{}\")",
            self.ton, self.npi, self.address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_international_address() {
        let addr = Address::international("+1234567890").unwrap();
        assert_eq!(addr.as_str(), "+1234567890");
        assert_eq!(addr.ton(), TypeOfNumber::International);
        assert_eq!(addr.npi(), NumericPlanIndicator::Isdn);
    }

    #[test]
    fn test_invalid_international() {
        let result = Address::international("+123abc");
        assert!(matches!(result, Err(AddressError::InvalidFormat { .. })));
        let result = Address::international("12+3");
        assert!(matches!(result, Err(AddressError::InvalidFormat { .. })));
    }

    #[test]
    fn test_alphanumeric_address() {
        let addr = Address::new(
            TypeOfNumber::Alphanumeric,
            NumericPlanIndicator::Unknown,
            "INFO SMS",
        )
        .unwrap();
        assert_eq!(format!("{addr}"), "INFO SMS");
    }

    #[test]
    fn test_address_too_long() {
        let result = Address::unknown(&"1".repeat(21));
        assert_eq!(
            result,
            Err(AddressError::TooLong {
                max_len: 20,
                actual_len: 21
            })
        );
    }

    #[test]
    fn test_address_from_raw_octets() {
        let addr = Address::from_raw(0x01, 0x01, "447700900123").unwrap();
        assert_eq!(addr, Address::international("447700900123").unwrap());
        assert_eq!(
            Address::from_raw(0x07, 0x01, "1"),
            Err(AddressError::UnknownTon(0x07))
        );
        assert_eq!(
            Address::from_raw(0x00, 0x02, "1"),
            Err(AddressError::UnknownNpi(0x02))
        );
    }

    #[test]
    fn test_addresses_differing_in_ton_are_distinct() {
        let a = Address::unknown("12345").unwrap();
        let b = Address::new(
            TypeOfNumber::National,
            NumericPlanIndicator::Isdn,
            "12345",
        )
        .unwrap();
        assert_ne!(a, b);
        assert!(Address::default().is_empty());
    }
}
