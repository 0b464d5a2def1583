pub mod amd;
pub mod cursor;
pub mod status;

pub use amd::{AmdHeader, FramingInfo, SegmentInfo, SN_MAX, SO_END_OF_PDU};
pub use status::{resolve_so_end, NackRange, StatusPdu};
