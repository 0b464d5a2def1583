//! An RLC (Radio Link Control) entity for 4G/LTE, implementing the Acknowledged Mode (AM)
//! sliding-window ARQ protocol of 3GPP TS 36.322, plus the simpler Unacknowledged Mode (UM) and
//! Transparent Mode (TM) sibling modes, behind the common [`RlcEntity`] interface.
//!
//! An AM entity sits between PDCP (above) and MAC (below) on one logical channel: PDCP pushes
//! SDUs in via [`RlcEntity::write_sdu`], MAC pulls framed PDUs out via
//! [`RlcEntity::read_pdu`] and hands received PDUs in via [`RlcEntity::write_pdu`], and RRC
//! configures, reestablishes, and tears the entity down.

mod am;
mod buffer_pool;
mod config;
mod entity;
mod err;
mod metrics;
mod pdu;
mod queue;
mod sn;
mod tm;
mod um;

pub use buffer_pool::{BudgetedBufferPool, BufferPool, ExhaustedBufferPool, PduBuf, SystemBufferPool};
pub use config::{AmConfig, TmConfig, UmConfig};
pub use entity::{RlcEntity, RlcMode};
pub use err::Error;
pub use metrics::Metrics;
pub use pdu::cursor::{BitReader, BitWriter};
pub use pdu::{AmdHeader, FramingInfo, NackRange, SegmentInfo, StatusPdu, SN_MAX, SO_END_OF_PDU};
pub use sn::{SnSpace, AM_SN_MODULUS, UM_SN_MODULUS};
