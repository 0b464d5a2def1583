//! AM receiver: reordering, reassembly, and STATUS PDU generation.
//!
//! Grounded on `tcp/tcb.rs`'s receive-side (`RecvSpace`, out-of-order segment buffering before
//! delivery) for the reorder/window shape; exact algorithms grounded on
//! `original_source/lib/src/upper/rlc_am.cc`'s `rlc_am_rx::*` methods.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::AmConfig;
use crate::pdu::{AmdHeader, FramingInfo, NackRange, SegmentInfo, StatusPdu};
use crate::sn::SnSpace;
use crate::timer::Timer;

use super::tx::WINDOW_SIZE;

const SN_SPACE: SnSpace = SnSpace::new(crate::sn::AM_SN_MODULUS);

#[derive(Debug, Clone)]
struct RxPduSlot {
    header: AmdHeader,
    payload: Vec<u8>,
}

#[derive(Debug, Clone)]
struct RxSegment {
    so_start: u16,
    so_end: u16,
    last_segment: bool,
    framing_info: FramingInfo,
    li: Vec<u16>,
    payload: Vec<u8>,
}

#[derive(Debug)]
pub struct RxEngine {
    cfg: AmConfig,

    vr_r: u16,
    vr_mr: u16,
    vr_x: u16,
    vr_ms: u16,
    vr_h: u16,

    rx_window: BTreeMap<u16, RxPduSlot>,
    rx_segments: BTreeMap<u16, Vec<RxSegment>>,

    do_status: bool,
    poll_received: bool,
    reordering_timer: Timer,

    sdu_assembly: Vec<u8>,
    delivered: Vec<Vec<u8>>,
    lost_sdu_count: u64,
}

impl RxEngine {
    pub fn new(cfg: AmConfig) -> Self {
        RxEngine {
            cfg,
            vr_r: 0,
            vr_mr: WINDOW_SIZE as u16,
            vr_x: 0,
            vr_ms: 0,
            vr_h: 0,
            rx_window: BTreeMap::new(),
            rx_segments: BTreeMap::new(),
            do_status: false,
            poll_received: false,
            reordering_timer: Timer::new(),
            sdu_assembly: Vec::new(),
            delivered: Vec::new(),
            lost_sdu_count: 0,
        }
    }

    pub fn vr_r(&self) -> u16 {
        self.vr_r
    }

    pub fn vr_h(&self) -> u16 {
        self.vr_h
    }

    pub fn get_do_status(&self) -> bool {
        self.do_status
    }

    pub fn lost_sdu_count(&self) -> u64 {
        self.lost_sdu_count
    }

    /// Drain SDUs reassembled since the last drain, in delivery order.
    pub fn take_delivered(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.delivered)
    }

    pub fn on_tick(&mut self, now_tti: u64) {
        if self.reordering_timer.is_running() {
            self.reordering_timer.check(now_tti);
            if self.reordering_timer.has_expired() {
                self.check_reordering_timeout(now_tti);
            }
        }
    }

    fn in_rx_window(&self, sn: u16) -> bool {
        SN_SPACE.is_inside(self.vr_r as u32, self.vr_mr as u32, sn as u32)
    }

    /// Entry point for a received transport block. Returns `true` if it was an AMD (data) PDU
    /// (as opposed to a STATUS PDU the caller should route to the Tx engine instead).
    pub fn write_pdu(&mut self, bytes: &[u8], now_tti: u64) -> Result<bool, crate::Error> {
        if StatusPdu::is_control_pdu(bytes[0]) {
            return Ok(false);
        }
        let mut r = crate::pdu::cursor::BitReader::new(bytes);
        let header = AmdHeader::read(&mut r)?;
        let payload = r.remaining_bytes()?.to_vec();

        if header.is_segment() {
            self.handle_data_pdu_segment(header, payload, now_tti);
        } else {
            self.handle_data_pdu(header, payload, now_tti);
        }
        Ok(true)
    }

    /// §4.2's `handle_data_pdu`.
    fn handle_data_pdu(&mut self, header: AmdHeader, payload: Vec<u8>, now_tti: u64) {
        let sn = header.sn;
        let poll = header.poll;

        if !self.in_rx_window(sn) || self.rx_window.contains_key(&sn) {
            warn!("dropping PDU sn={} (out of window or duplicate)", sn);
            if poll {
                self.arm_status_for_poll(sn, now_tti);
            }
            return;
        }

        self.rx_window.insert(sn, RxPduSlot { header, payload });
        self.vr_h = if SN_SPACE.diff_mod(self.vr_r as u32, SN_SPACE.advance(sn as u32, 1))
            > SN_SPACE.diff_mod(self.vr_r as u32, self.vr_h as u32)
        {
            SN_SPACE.advance(sn as u32, 1) as u16
        } else {
            self.vr_h
        };

        let mut probe = self.vr_ms;
        while self.rx_window.contains_key(&probe) {
            probe = SN_SPACE.advance(probe as u32, 1) as u16;
        }
        self.vr_ms = probe;

        if poll {
            self.arm_status_for_poll(sn, now_tti);
        }

        self.reassemble_rx_sdus(now_tti);
    }

    /// On a polled PDU, decide whether to answer immediately or wait for reordering. If
    /// `sn` is out of window the poll can't tell us anything useful about ordering, so answer
    /// now. Otherwise the decision turns on whether a gap still exists below `VR(H)`: none means
    /// everything up to the highest-received SN is accounted for, so report now; a gap means
    /// something may still be in flight, so (re)start t-Reordering and let its expiry (which
    /// itself re-arms `do_status` if the gap persists) do the reporting.
    fn arm_status_for_poll(&mut self, sn: u16, now_tti: u64) {
        self.poll_received = true;
        if !self.in_rx_window(sn) {
            self.do_status = true;
            return;
        }
        if SN_SPACE.diff_mod(self.vr_ms as u32, self.vr_h as u32) == 0 {
            self.do_status = true;
        } else {
            self.start_reordering(now_tti);
        }
    }

    fn start_reordering(&mut self, now_tti: u64) {
        self.vr_x = self.vr_h;
        self.reordering_timer.start(now_tti, self.cfg.t_reordering);
    }

    /// §4.2's `handle_data_pdu_segment`.
    fn handle_data_pdu_segment(&mut self, header: AmdHeader, payload: Vec<u8>, now_tti: u64) {
        let sn = header.sn;
        if !self.in_rx_window(sn) {
            warn!("dropping segment sn={} (out of window)", sn);
            if header.poll {
                self.arm_status_for_poll(sn, now_tti);
            }
            return;
        }
        let seg = header.segment.expect("segment header");
        let expected_start = self
            .rx_segments
            .get(&sn)
            .and_then(|segs| segs.last())
            .map(|s| s.so_end)
            .unwrap_or(0);

        if seg.segment_offset != expected_start && self.rx_segments.contains_key(&sn) {
            warn!(
                "sn {} segment offset {} out of order (expected {}), dropping",
                sn, seg.segment_offset, expected_start
            );
            if header.poll {
                self.arm_status_for_poll(sn, now_tti);
            }
            return;
        }

        let so_end = seg.segment_offset + payload.len() as u16;
        let last_segment = seg.last_segment;
        self.rx_segments.entry(sn).or_default().push(RxSegment {
            so_start: seg.segment_offset,
            so_end,
            last_segment,
            framing_info: header.framing_info,
            li: header.li.clone(),
            payload,
        });

        if header.poll {
            self.arm_status_for_poll(sn, now_tti);
        }

        self.try_complete_segment(sn, now_tti);
    }

    fn try_complete_segment(&mut self, sn: u16, now_tti: u64) {
        let complete = self
            .rx_segments
            .get(&sn)
            .map(|segs| segs.last().map(|s| s.last_segment).unwrap_or(false))
            .unwrap_or(false);
        if !complete {
            return;
        }
        let segs = self.rx_segments.remove(&sn).unwrap();

        let mut payload = Vec::new();
        let mut li = Vec::new();
        for seg in &segs {
            if !payload.is_empty() {
                // carry over any LI boundaries that fell inside this segment, shifted by the
                // running payload offset already accumulated.
                for &l in &seg.li {
                    li.push(l + payload.len() as u16);
                }
            } else {
                li.extend(seg.li.iter().copied());
            }
            payload.extend_from_slice(&seg.payload);
        }

        let first = segs.first().unwrap().framing_info;
        let last = segs.last().unwrap().framing_info;
        let framing_info = FramingInfo::combine_start_end(first, last);

        let synthetic = AmdHeader {
            poll: false,
            framing_info,
            sn,
            segment: None,
            li,
        };
        debug!("reassembled segmented PDU sn={} len={}", sn, payload.len());
        self.handle_data_pdu(synthetic, payload, now_tti);
    }

    /// §4.2's `reassemble_rx_sdus`: drain in-order PDUs from `VR(R)` forward.
    fn reassemble_rx_sdus(&mut self, now_tti: u64) {
        while let Some(slot) = self.rx_window.get(&self.vr_r).cloned() {
            let header = &slot.header;
            let mut offset = 0usize;
            let mut discarded_prefix = false;

            if !header.framing_info.is_start_aligned() && self.sdu_assembly.is_empty() {
                // the start of this PDU's payload belongs to an SDU whose beginning was lost
                discarded_prefix = true;
            }

            for &li in &header.li {
                let li = li as usize;
                if li > slot.payload.len() - offset {
                    break;
                }
                let chunk = &slot.payload[offset..offset + li];
                if discarded_prefix {
                    discarded_prefix = false;
                    self.lost_sdu_count += 1;
                } else {
                    self.sdu_assembly.extend_from_slice(chunk);
                    let sdu = std::mem::take(&mut self.sdu_assembly);
                    self.delivered.push(sdu);
                }
                offset += li;
            }

            let residual = &slot.payload[offset..];
            if discarded_prefix && !residual.is_empty() && header.li.is_empty() {
                self.lost_sdu_count += 1;
            } else if !residual.is_empty() {
                self.sdu_assembly.extend_from_slice(residual);
                if header.framing_info.is_end_aligned() {
                    let sdu = std::mem::take(&mut self.sdu_assembly);
                    self.delivered.push(sdu);
                }
            }

            self.rx_window.remove(&self.vr_r);
            self.vr_r = SN_SPACE.advance(self.vr_r as u32, 1) as u16;
            self.vr_mr = SN_SPACE.advance(self.vr_r as u32, WINDOW_SIZE) as u16;
        }
        let _ = now_tti;
    }

    /// TS 36.322 §5.1.3.2.4 t-Reordering expiry.
    fn check_reordering_timeout(&mut self, now_tti: u64) {
        self.reordering_timer.stop();
        self.vr_ms = self.vr_x;
        let mut probe = self.vr_ms;
        while self.rx_window.contains_key(&probe) {
            probe = SN_SPACE.advance(probe as u32, 1) as u16;
        }
        self.vr_ms = probe;

        if self.poll_received {
            self.do_status = true;
        }

        if SN_SPACE.diff_mod(self.vr_ms as u32, self.vr_h as u32) > 0 {
            self.vr_x = self.vr_h;
            self.reordering_timer.start(now_tti, self.cfg.t_reordering);
        }
    }

    /// §4.2's STATUS generation: ACK_SN = VR(MS), full-PDU NACKs for gaps in `[VR(R), VR(MS))`.
    pub fn build_status_pdu(&mut self) -> StatusPdu {
        let mut nacks = Vec::new();
        let mut i = self.vr_r;
        while SN_SPACE.diff_mod(self.vr_r as u32, i as u32)
            < SN_SPACE.diff_mod(self.vr_r as u32, self.vr_ms as u32)
        {
            if !self.rx_window.contains_key(&i) {
                nacks.push(NackRange { sn: i, so: None });
            }
            i = SN_SPACE.advance(i as u32, 1) as u16;
        }
        self.do_status = false;
        self.poll_received = false;
        StatusPdu {
            ack_sn: self.vr_ms,
            nacks,
        }
    }

    pub fn reestablish(&mut self) {
        self.vr_r = 0;
        self.vr_mr = WINDOW_SIZE as u16;
        self.vr_x = 0;
        self.vr_ms = 0;
        self.vr_h = 0;
        self.rx_window.clear();
        self.rx_segments.clear();
        self.do_status = false;
        self.poll_received = false;
        self.reordering_timer.stop();
        self.sdu_assembly.clear();
        self.delivered.clear();
    }

    pub fn stop(&mut self) {
        self.rx_window.clear();
        self.rx_segments.clear();
        self.reordering_timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RxEngine {
        RxEngine::new(AmConfig::default())
    }

    fn whole_pdu(sn: u16, poll: bool, data: &[u8]) -> Vec<u8> {
        let header = AmdHeader {
            poll,
            framing_info: FramingInfo::StartAndEndAligned,
            sn,
            segment: None,
            li: vec![],
        };
        let mut w = crate::pdu::cursor::BitWriter::new();
        header.write(&mut w).unwrap();
        let mut bytes = w.finish();
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn in_order_delivery() {
        let mut rx = engine();
        assert!(rx.write_pdu(&whole_pdu(0, false, b"hello"), 0).unwrap());
        let delivered = rx.take_delivered();
        assert_eq!(delivered, vec![b"hello".to_vec()]);
        assert_eq!(rx.vr_r(), 1);
    }

    #[test]
    fn out_of_window_with_poll_arms_status() {
        let mut rx = engine();
        rx.vr_r = 10;
        rx.vr_mr = 522;
        rx.vr_ms = 10;
        assert!(rx.write_pdu(&whole_pdu(5, true, b"x"), 0).unwrap());
        assert!(rx.get_do_status());
        assert!(rx.take_delivered().is_empty());
    }

    #[test]
    fn duplicate_pdu_dropped() {
        let mut rx = engine();
        rx.write_pdu(&whole_pdu(0, false, b"hi"), 0).unwrap();
        rx.take_delivered();
        rx.write_pdu(&whole_pdu(0, false, b"hi"), 0).unwrap();
        assert!(rx.take_delivered().is_empty());
    }

    #[test]
    fn status_pdu_nacks_gap() {
        let mut rx = engine();
        rx.write_pdu(&whole_pdu(0, false, b"a"), 0).unwrap();
        rx.write_pdu(&whole_pdu(2, false, b"c"), 0).unwrap();
        rx.vr_ms = 3;
        let status = rx.build_status_pdu();
        assert_eq!(status.ack_sn, 3);
        assert_eq!(status.nacks, vec![NackRange { sn: 1, so: None }]);
    }

    #[test]
    fn segmented_pdu_reassembles() {
        let mut rx = engine();
        let header1 = AmdHeader {
            poll: false,
            framing_info: FramingInfo::NotEndAligned,
            sn: 0,
            segment: Some(SegmentInfo {
                last_segment: false,
                segment_offset: 0,
            }),
            li: vec![],
        };
        let mut w = crate::pdu::cursor::BitWriter::new();
        header1.write(&mut w).unwrap();
        let mut bytes1 = w.finish();
        bytes1.extend_from_slice(b"hel");

        let header2 = AmdHeader {
            poll: false,
            framing_info: FramingInfo::NotStartAligned,
            sn: 0,
            segment: Some(SegmentInfo {
                last_segment: true,
                segment_offset: 3,
            }),
            li: vec![],
        };
        let mut w2 = crate::pdu::cursor::BitWriter::new();
        header2.write(&mut w2).unwrap();
        let mut bytes2 = w2.finish();
        bytes2.extend_from_slice(b"lo");

        rx.write_pdu(&bytes1, 0).unwrap();
        rx.write_pdu(&bytes2, 0).unwrap();
        let delivered = rx.take_delivered();
        assert_eq!(delivered, vec![b"hello".to_vec()]);
    }
}
