//! `RlcEntity`: the tagged-variant polymorphic wrapper of spec §9, replacing the reference
//! implementation's `rlc_common` inheritance hierarchy (TM/UM/AM as subclasses of one abstract
//! base) with a plain enum match. The variant is fixed at construction; changing mode requires
//! destroying and recreating the entity (the `reestablish` path never changes variant).

use crate::am::AmEntity;
use crate::config::{AmConfig, TmConfig, UmConfig};
use crate::tm::TmEntity;
use crate::um::UmEntity;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlcMode {
    Tm,
    Um,
    Am,
}

pub enum RlcEntity {
    Tm(TmEntity),
    Um(UmEntity),
    Am(AmEntity),
}

impl RlcEntity {
    pub fn new_tm(cfg: TmConfig) -> Result<Self, Error> {
        Ok(RlcEntity::Tm(TmEntity::new(cfg)?))
    }

    pub fn new_um(cfg: UmConfig) -> Result<Self, Error> {
        Ok(RlcEntity::Um(UmEntity::new(cfg)?))
    }

    pub fn new_am(cfg: AmConfig) -> Result<Self, Error> {
        Ok(RlcEntity::Am(AmEntity::new(cfg)?))
    }

    pub fn get_mode(&self) -> RlcMode {
        match self {
            RlcEntity::Tm(_) => RlcMode::Tm,
            RlcEntity::Um(_) => RlcMode::Um,
            RlcEntity::Am(_) => RlcMode::Am,
        }
    }

    /// The logical channel ID this entity was configured with by RRC.
    pub fn get_bearer(&self) -> u32 {
        match self {
            RlcEntity::Tm(e) => e.get_bearer(),
            RlcEntity::Um(e) => e.get_bearer(),
            RlcEntity::Am(e) => e.get_bearer(),
        }
    }

    pub fn write_sdu(&self, sdu: Vec<u8>, blocking: bool) -> Result<(), Error> {
        match self {
            RlcEntity::Tm(e) => e.write_sdu(sdu, blocking),
            RlcEntity::Um(e) => e.write_sdu(sdu, blocking),
            RlcEntity::Am(e) => e.write_sdu(sdu, blocking),
        }
    }

    /// `now_tti` is ignored by TM, which carries no timers.
    pub fn read_pdu(&self, max_bytes: usize, now_tti: u64) -> Vec<u8> {
        match self {
            RlcEntity::Tm(e) => e.read_pdu(max_bytes),
            RlcEntity::Um(e) => e.read_pdu(max_bytes),
            RlcEntity::Am(e) => e.read_pdu(max_bytes, now_tti),
        }
    }

    pub fn write_pdu(&self, bytes: &[u8], now_tti: u64) -> Result<(), Error> {
        match self {
            RlcEntity::Tm(e) => {
                let _ = e.write_pdu(bytes);
                Ok(())
            }
            RlcEntity::Um(e) => e.write_pdu(bytes, now_tti),
            RlcEntity::Am(e) => e.write_pdu(bytes, now_tti),
        }
    }

    /// SDUs reassembled and ready for PDCP delivery. TM delivers synchronously from `write_pdu`
    /// instead (it has no reassembly state to drain), so this is always empty for TM.
    pub fn take_delivered_sdus(&self) -> Vec<Vec<u8>> {
        match self {
            RlcEntity::Tm(_) => Vec::new(),
            RlcEntity::Um(e) => e.take_delivered_sdus(),
            RlcEntity::Am(e) => e.take_delivered_sdus(),
        }
    }

    pub fn on_tick(&self, now_tti: u64) {
        match self {
            RlcEntity::Tm(_) => {}
            RlcEntity::Um(e) => e.on_tick(now_tti),
            RlcEntity::Am(e) => e.on_tick(now_tti),
        }
    }

    pub fn get_buffer_state(&self, now_tti: u64) -> usize {
        match self {
            RlcEntity::Tm(e) => e.get_buffer_state(),
            RlcEntity::Um(e) => e.get_buffer_state(),
            RlcEntity::Am(e) => e.get_buffer_state(now_tti),
        }
    }

    pub fn reestablish(&self) {
        match self {
            RlcEntity::Tm(e) => e.reestablish(),
            RlcEntity::Um(e) => e.reestablish(),
            RlcEntity::Am(e) => e.reestablish(),
        }
    }

    pub fn stop(&self) {
        match self {
            RlcEntity::Tm(e) => e.stop(),
            RlcEntity::Um(e) => e.stop(),
            RlcEntity::Am(e) => e.stop(),
        }
    }

    pub fn empty_queue(&self) {
        match self {
            RlcEntity::Tm(e) => e.empty_queue(),
            RlcEntity::Um(e) => e.empty_queue(),
            RlcEntity::Am(e) => e.empty_queue(),
        }
    }

    pub fn get_num_tx_bytes(&self) -> u64 {
        match self {
            RlcEntity::Tm(e) => e.get_num_tx_bytes(),
            RlcEntity::Um(e) => e.get_num_tx_bytes(),
            RlcEntity::Am(e) => e.get_num_tx_bytes(),
        }
    }

    pub fn get_num_rx_bytes(&self) -> u64 {
        match self {
            RlcEntity::Tm(e) => e.get_num_rx_bytes(),
            RlcEntity::Um(e) => e.get_num_rx_bytes(),
            RlcEntity::Am(e) => e.get_num_rx_bytes(),
        }
    }
}
