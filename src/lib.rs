pub mod datatypes;
pub mod encoding;
pub mod gsm;
pub mod message;
pub mod pdu;


// Re-export the types most callers need
pub use encoding::{Alphabet, EncodingError};
pub use gsm::{UserData, UserDataError};
pub use message::{
    AssemblerConfig, AssemblyError, Content, Delivery, LogicalMessage, MessageAssembler,
    MessageError, MessageSegmenter, ReassemblyKey, Scheme, SegmentationConfig,
};
pub use pdu::{ShortMessagePacket, SmPacket};

/// Error returned by most functions.
///
/// Each module has its own error `enum` ([`MessageError`], [`AssemblyError`],
/// [`UserDataError`]); this boxed form is a convenience for applications
/// that only need to report failures.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for segmentation and reassembly.
///
/// This is defined as a convenience.
///
/// # Examples
///
/// ## Splitting a long message
///
/// ```rust
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use smpp_concat::datatypes::{Address, CommandId};
/// use smpp_concat::{Alphabet, LogicalMessage, MessageSegmenter, Scheme, SmPacket};
///
/// fn main() -> smpp_concat::Result<()> {
///     let mut template = SmPacket::new(CommandId::SubmitSm);
///     template.source = Address::international("447700900001")?;
///     template.destination = Address::international("447700900002")?;
///
///     let text = "All work and no play makes Jack a dull boy. ".repeat(5);
///     let message = LogicalMessage::text(Alphabet::Gsm7Bit, text);
///
///     let mut segmenter = MessageSegmenter::new(StdRng::from_entropy());
///     let packets = segmenter.segment(&message, Scheme::Udh, &template)?;
///     assert_eq!(packets.len(), 2);
///     assert!(packets.iter().all(|packet| packet.esm_class.has_udhi()));
///     Ok(())
/// }
/// ```
///
/// ## Reassembling received segments
///
/// ```rust
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use smpp_concat::datatypes::CommandId;
/// use smpp_concat::{Delivery, LogicalMessage, MessageAssembler, MessageSegmenter, Scheme, SmPacket};
///
/// fn main() -> smpp_concat::Result<()> {
///     let message = LogicalMessage::binary(vec![0x42; 600]);
///     let mut segmenter = MessageSegmenter::new(StdRng::seed_from_u64(7));
///     let packets = segmenter.segment(&message, Scheme::Sar, &SmPacket::new(CommandId::DataSm))?;
///
///     let assembler = MessageAssembler::default();
///     for packet in packets.iter().rev() {
///         if let Delivery::Complete(key) = assembler.deliver(packet)? {
///             assert_eq!(assembler.remove(&key)?, message);
///         }
///     }
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
