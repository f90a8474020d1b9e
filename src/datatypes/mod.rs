mod address;
mod command_id;
mod data_coding;
mod esm_class;
mod numeric_plan_indicator;
mod tlv;
mod type_of_number;

pub use address::{Address, AddressError, MAX_ADDRESS_LENGTH};
pub use command_id::CommandId;
pub use data_coding::{DataCoding, MessageClass};
pub use esm_class::{EsmClass, MessageMode};
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use tlv::{Tag, Tlv, TlvError, TlvTable};
pub use type_of_number::TypeOfNumber;
