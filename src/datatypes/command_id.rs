// ABOUTME: Command ids of the SMPP PDUs that carry user data
// ABOUTME: Decides whether user data goes in short_message or message_payload

use num_enum::TryFromPrimitive;

/// Command ids of the PDUs that carry short message user data.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    SubmitSm = 0x0000_0004,
    DeliverSm = 0x0000_0005,
    SubmitMulti = 0x0000_0021,
    DataSm = 0x0000_0103,
}

impl CommandId {
    /// data_sm has no short_message field; user data always travels in
    /// the message_payload optional parameter.
    pub fn has_short_message(&self) -> bool {
        !matches!(self, CommandId::DataSm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_id_from_wire() {
        assert_eq!(CommandId::try_from(0x0000_0103u32), Ok(CommandId::DataSm));
        assert!(CommandId::try_from(0x0000_0015u32).is_err());
        assert!(!CommandId::DataSm.has_short_message());
        assert!(CommandId::SubmitMulti.has_short_message());
    }
}
