//! STATUS PDU: pack/unpack per SPEC_FULL §6.
//!
//! Field order grounded on `original_source/rlc_am.cc`'s `rlc_am_read_status_pdu` /
//! `rlc_am_write_status_pdu`: ACK_SN then a leading E1, then per-NACK
//! `{NACK_SN, E1 (more follow), E2 (SO present), [SO_start, SO_end]}`.

use super::cursor::{BitReader, BitWriter};
use crate::pdu::amd::SO_END_OF_PDU;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NackRange {
    pub sn: u16,
    /// `Some((so_start, so_end))` when this NACK covers only part of the PDU; `so_end ==
    /// SO_END_OF_PDU` means "to the end of the PDU".
    pub so: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPdu {
    pub ack_sn: u16,
    pub nacks: Vec<NackRange>,
}

impl StatusPdu {
    pub fn packed_len(&self) -> usize {
        let mut bits = 1 + 3 + 10 + 1; // D/C, CPT, ACK_SN, leading E1
        for nack in &self.nacks {
            bits += 10 + 1 + 1;
            if nack.so.is_some() {
                bits += 15 + 15;
            }
        }
        (bits + 7) / 8
    }

    pub fn write(&self, w: &mut BitWriter) -> Result<(), Error> {
        if self.ack_sn > super::amd::SN_MAX {
            return Err(Error::MalformedPdu {
                reason: "ACK_SN exceeds 10-bit range",
            });
        }
        w.write_bit(true); // D/C: 1 = control PDU
        w.write_bits(0, 3); // CPT: 0 = STATUS
        w.write_bits(self.ack_sn as u32, 10);
        w.write_bit(!self.nacks.is_empty());

        for (idx, nack) in self.nacks.iter().enumerate() {
            w.write_bits(nack.sn as u32, 10);
            let more = idx + 1 < self.nacks.len();
            w.write_bit(more);
            match nack.so {
                Some((so_start, so_end)) => {
                    w.write_bit(true);
                    w.write_bits(so_start as u32, 15);
                    w.write_bits(so_end as u32, 15);
                }
                None => w.write_bit(false),
            }
        }
        Ok(())
    }

    pub fn read(r: &mut BitReader) -> Result<Self, Error> {
        let dc = r.read_bit()?;
        if !dc {
            return Err(Error::MalformedPdu {
                reason: "expected a control PDU but D/C indicated a data PDU",
            });
        }
        let cpt = r.read_bits(3)?;
        if cpt != 0 {
            return Err(Error::MalformedPdu {
                reason: "unsupported control PDU type (only STATUS is implemented)",
            });
        }
        let ack_sn = r.read_bits(10)? as u16;
        let mut e1 = r.read_bit()?;
        let mut nacks = Vec::new();
        while e1 {
            let sn = r.read_bits(10)? as u16;
            e1 = r.read_bit()?;
            let e2 = r.read_bit()?;
            let so = if e2 {
                let so_start = r.read_bits(15)? as u16;
                let so_end = r.read_bits(15)? as u16;
                Some((so_start, so_end))
            } else {
                None
            };
            nacks.push(NackRange { sn, so });
        }
        Ok(StatusPdu { ack_sn, nacks })
    }

    /// Whether this PDU's D/C bit marks it as a control (STATUS) PDU, without fully decoding it.
    /// Mirrors `rlc_am_is_control_pdu`'s cheap top-bit peek.
    pub fn is_control_pdu(first_byte: u8) -> bool {
        (first_byte >> 7) & 0x1 == 1
    }
}

/// Resolve a NACK's `so_end` sentinel into a concrete end offset given the PDU's real length, per
/// the `0x7FFF` == "to end of PDU" convention.
pub fn resolve_so_end(so_end: u16, pdu_len: u16) -> u16 {
    if so_end == SO_END_OF_PDU {
        pdu_len
    } else {
        // The reference implementation stores so_end as the offset of the last included byte,
        // so a concrete value needs +1 to become an exclusive end bound.
        so_end + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &StatusPdu) -> StatusPdu {
        let mut w = BitWriter::new();
        s.write(&mut w).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        StatusPdu::read(&mut r).unwrap()
    }

    #[test]
    fn roundtrips_no_nacks() {
        let s = StatusPdu {
            ack_sn: 42,
            nacks: vec![],
        };
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn roundtrips_full_pdu_nacks() {
        let s = StatusPdu {
            ack_sn: 10,
            nacks: vec![
                NackRange { sn: 1, so: None },
                NackRange { sn: 3, so: None },
            ],
        };
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn roundtrips_segment_nacks() {
        let s = StatusPdu {
            ack_sn: 500,
            nacks: vec![NackRange {
                sn: 7,
                so: Some((0, SO_END_OF_PDU)),
            }],
        };
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn resolve_so_end_handles_sentinel_and_concrete() {
        assert_eq!(resolve_so_end(SO_END_OF_PDU, 400), 400);
        assert_eq!(resolve_so_end(96, 400), 97);
    }
}
