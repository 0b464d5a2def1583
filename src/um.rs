//! UM (Unacknowledged Mode): SN-tagged segmentation/reassembly without ARQ.
//!
//! Grounded on §4.6 and `original_source`'s `rlc_um.h` analogue (referenced, not translated,
//! from `rlc_entity.h`): reuses AM's framing cursor and LI list helpers (`pdu::amd::{write,read}_li_list`)
//! with a shorter fixed part (no RF/poll/SO) and a single t-Reordering timer in place of AM's
//! three-timer ARQ machinery.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::UmConfig;
use crate::metrics::Metrics;
use crate::pdu::cursor::{BitReader, BitWriter};
use crate::pdu::{amd, FramingInfo};
use crate::queue::SduQueue;
use crate::sn::SnSpace;
use crate::timer::Timer;
use crate::Error;

const SN_SPACE: SnSpace = SnSpace::new(crate::sn::UM_SN_MODULUS);
const WINDOW_SIZE: u32 = 512;

/// UMD (UM Data) PDU header: framing info, SN, LI list. No D/C, RF, poll, or SO fields — UM PDUs
/// are distinguished from AM/control traffic at the bearer-mapping level, not by a header bit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UmdHeader {
    framing_info: FramingInfo,
    sn: u16,
    li: Vec<u16>,
}

impl UmdHeader {
    fn write(&self, w: &mut BitWriter) -> Result<(), Error> {
        if self.sn > 1023 {
            return Err(Error::MalformedPdu {
                reason: "UM SN exceeds 10-bit range",
            });
        }
        w.write_bits(self.framing_info.to_bits(), 2);
        w.write_bit(!self.li.is_empty());
        w.write_bits((self.sn as u32) >> 8, 2);
        w.write_bits((self.sn as u32) & 0xFF, 8);
        amd::write_li_list(w, &self.li)
    }

    fn read(r: &mut BitReader) -> Result<Self, Error> {
        let fi = FramingInfo::from_bits(r.read_bits(2)?);
        let has_ext = r.read_bit()?;
        let sn_high = r.read_bits(2)?;
        let sn_low = r.read_bits(8)?;
        let sn = ((sn_high << 8) | sn_low) as u16;
        let li = amd::read_li_list(r, has_ext)?;
        Ok(UmdHeader {
            framing_info: fi,
            sn,
            li,
        })
    }
}

pub struct UmEntity {
    cfg: UmConfig,
    queue: SduQueue,
    metrics: Metrics,
    state: std::sync::Mutex<State>,
}

struct State {
    vt_us: u16,
    vr_ur: u16,
    vr_uh: u16,
    rx_window: BTreeMap<u16, (FramingInfo, Vec<u16>, Vec<u8>)>,
    reordering_timer: Timer,
    sdu_assembly: Vec<u8>,
    delivered: Vec<Vec<u8>>,
}

impl UmEntity {
    pub fn new(cfg: UmConfig) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(UmEntity {
            cfg,
            queue: SduQueue::new(cfg.tx_queue_capacity),
            metrics: Metrics::default(),
            state: std::sync::Mutex::new(State {
                vt_us: 0,
                vr_ur: 0,
                vr_uh: 0,
                rx_window: BTreeMap::new(),
                reordering_timer: Timer::new(),
                sdu_assembly: Vec::new(),
                delivered: Vec::new(),
            }),
        })
    }

    pub fn write_sdu(&self, sdu: Vec<u8>, blocking: bool) -> Result<(), Error> {
        if blocking {
            self.queue.push(sdu)
        } else {
            self.queue.try_push(sdu)
        }
    }

    /// No retransmission queue, no poll bit: each grant either fits one-or-more whole SDUs or a
    /// single truncated one, identically to AM's `build_data_pdu` minus the ARQ bookkeeping.
    pub fn read_pdu(&self, max_bytes: usize) -> Vec<u8> {
        if max_bytes < 2 {
            return Vec::new();
        }
        let mut state = self.state.lock().unwrap();
        let mut payload = Vec::new();
        let mut li = Vec::new();
        // offset where the current SDU began; an LI entry is a unit's own length, not the
        // running total.
        let mut unit_start = 0usize;
        loop {
            let header_len = 2 + ((li.len() + 1) * 12 + 7) / 8;
            if max_bytes < header_len + payload.len() + 1 && !payload.is_empty() {
                break;
            }
            let remaining = max_bytes.saturating_sub(header_len).saturating_sub(payload.len());
            if remaining == 0 {
                break;
            }
            let front_len = self.queue.front_bytes();
            if front_len == 0 {
                break;
            }
            if front_len <= remaining {
                let sdu = match self.queue.try_pop() {
                    Some(s) => s,
                    None => break,
                };
                if !payload.is_empty() {
                    li.push((payload.len() - unit_start) as u16);
                }
                unit_start = payload.len();
                payload.extend_from_slice(&sdu);
            } else {
                break;
            }
        }
        if payload.is_empty() {
            return Vec::new();
        }
        let sn = state.vt_us;
        state.vt_us = SN_SPACE.advance(sn as u32, 1) as u16;
        drop(state);

        let header = UmdHeader {
            framing_info: FramingInfo::StartAndEndAligned,
            sn,
            li,
        };
        let mut w = BitWriter::new();
        if header.write(&mut w).is_err() {
            return Vec::new();
        }
        self.metrics.add_tx_bytes(payload.len());
        debug!("built UM PDU sn={} len={}", sn, payload.len());
        let mut bytes = w.finish();
        bytes.extend_from_slice(&payload);
        bytes
    }

    pub fn write_pdu(&self, bytes: &[u8], now_tti: u64) -> Result<(), Error> {
        self.metrics.add_rx_bytes(bytes.len());
        let mut r = BitReader::new(bytes);
        let header = UmdHeader::read(&mut r)?;
        let payload = r.remaining_bytes()?.to_vec();

        let mut state = self.state.lock().unwrap();
        let window_high = SN_SPACE.advance(state.vr_ur as u32, WINDOW_SIZE);
        let out_of_window = !SN_SPACE.is_inside(state.vr_ur as u32, window_high, header.sn as u32);
        if out_of_window || state.rx_window.contains_key(&header.sn) {
            warn!("dropping duplicate/out-of-window UM PDU sn={}", header.sn);
            return Ok(());
        }
        state
            .rx_window
            .insert(header.sn, (header.framing_info, header.li, payload));
        let candidate = SN_SPACE.advance(header.sn as u32, 1) as u16;
        if SN_SPACE.diff_mod(state.vr_ur as u32, candidate as u32)
            > SN_SPACE.diff_mod(state.vr_ur as u32, state.vr_uh as u32)
        {
            state.vr_uh = candidate;
        }

        reassemble(&mut state);

        if state.vr_ur == state.vr_uh {
            state.reordering_timer.stop();
        } else if !state.reordering_timer.is_running() {
            state.reordering_timer.start(now_tti, self.cfg.t_reordering);
        }
        Ok(())
    }

    pub fn on_tick(&self, now_tti: u64) {
        let mut state = self.state.lock().unwrap();
        if state.reordering_timer.is_running() {
            state.reordering_timer.check(now_tti);
            if state.reordering_timer.has_expired() {
                state.reordering_timer.stop();
                state.vr_ur = state.vr_uh;
                reassemble(&mut state);
            }
        }
    }

    pub fn take_delivered_sdus(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().unwrap().delivered)
    }

    pub fn get_buffer_state(&self) -> usize {
        self.queue.bytes_pending()
    }

    pub fn get_bearer(&self) -> u32 {
        self.cfg.lcid
    }

    pub fn reestablish(&self) {
        self.queue.reset();
        self.metrics.reset();
        let mut state = self.state.lock().unwrap();
        state.vt_us = 0;
        state.vr_ur = 0;
        state.vr_uh = 0;
        state.rx_window.clear();
        state.reordering_timer.stop();
        state.sdu_assembly.clear();
        state.delivered.clear();
    }

    pub fn stop(&self) {
        self.queue.close();
        let mut state = self.state.lock().unwrap();
        state.rx_window.clear();
        state.reordering_timer.stop();
    }

    pub fn empty_queue(&self) {
        self.queue.reset();
    }

    pub fn get_num_tx_bytes(&self) -> u64 {
        self.metrics.num_tx_bytes()
    }

    pub fn get_num_rx_bytes(&self) -> u64 {
        self.metrics.num_rx_bytes()
    }
}

/// Drains `rx_window` from `vr_ur` forward, delivering reassembled SDUs in order. Mirrors AM's
/// `reassemble_rx_sdus` without the ARQ window-removal bookkeeping.
fn reassemble(state: &mut State) {
    while let Some((framing_info, li, payload)) = state.rx_window.remove(&state.vr_ur) {
        let mut offset = 0usize;
        for &l in &li {
            let l = l as usize;
            if l > payload.len() - offset {
                break;
            }
            state.sdu_assembly.extend_from_slice(&payload[offset..offset + l]);
            let sdu = std::mem::take(&mut state.sdu_assembly);
            state.delivered.push(sdu);
            offset += l;
        }
        let residual = &payload[offset..];
        if !residual.is_empty() {
            state.sdu_assembly.extend_from_slice(residual);
            if framing_info.is_end_aligned() {
                let sdu = std::mem::take(&mut state.sdu_assembly);
                state.delivered.push(sdu);
            }
        }
        state.vr_ur = SN_SPACE.advance(state.vr_ur as u32, 1) as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = UmdHeader {
            framing_info: FramingInfo::NotStartOrEndAligned,
            sn: 42,
            li: vec![10, 20],
        };
        let mut w = BitWriter::new();
        h.write(&mut w).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(UmdHeader::read(&mut r).unwrap(), h);
    }

    #[test]
    fn three_sdus_in_one_pdu_produce_individual_segment_lengths() {
        let tx = UmEntity::new(UmConfig::default()).unwrap();
        tx.write_sdu(vec![0u8; 10], true).unwrap();
        tx.write_sdu(vec![1u8; 20], true).unwrap();
        tx.write_sdu(vec![2u8; 5], true).unwrap();
        let pdu = tx.read_pdu(200);
        let mut r = BitReader::new(&pdu);
        let header = UmdHeader::read(&mut r).unwrap();
        assert_eq!(header.li, vec![10, 20]);
    }

    #[test]
    fn single_sdu_round_trips_end_to_end() {
        let tx = UmEntity::new(UmConfig::default()).unwrap();
        let rx = UmEntity::new(UmConfig::default()).unwrap();
        tx.write_sdu(b"hello world".to_vec(), true).unwrap();
        let pdu = tx.read_pdu(100);
        assert!(!pdu.is_empty());
        rx.write_pdu(&pdu, 0).unwrap();
        assert_eq!(rx.take_delivered_sdus(), vec![b"hello world".to_vec()]);
    }

    #[test]
    fn reordering_timer_flushes_out_of_order_arrival() {
        let tx = UmEntity::new(UmConfig::default()).unwrap();
        tx.write_sdu(b"aaa".to_vec(), true).unwrap();
        tx.write_sdu(b"bbb".to_vec(), true).unwrap();
        let pdu0 = tx.read_pdu(100);
        let pdu1 = tx.read_pdu(100);

        let rx = UmEntity::new(UmConfig::default()).unwrap();
        rx.write_pdu(&pdu1, 0).unwrap();
        assert!(rx.take_delivered_sdus().is_empty());
        rx.write_pdu(&pdu0, 1).unwrap();
        let delivered = rx.take_delivered_sdus();
        assert_eq!(delivered, vec![b"aaa".to_vec(), b"bbb".to_vec()]);
    }
}
