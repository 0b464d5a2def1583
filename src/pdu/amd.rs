//! AMD (AM Data) PDU header: pack/unpack per the on-wire layout of SPEC_FULL §6.
//!
//! Exact field widths and ordering are grounded on
//! `original_source/lib/src/upper/rlc_am.cc`'s `rlc_am_read_data_pdu_header` /
//! `rlc_am_write_data_pdu_header`.

use super::cursor::{BitReader, BitWriter};
use crate::Error;

/// Two-bit framing info: which ends of the PDU's payload are SDU-boundary aligned.
///
/// Bit layout matches the reference implementation: high bit set means the first byte is *not*
/// start-aligned, low bit set means the last byte is *not* end-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingInfo {
    StartAndEndAligned,
    NotEndAligned,
    NotStartAligned,
    NotStartOrEndAligned,
}

impl FramingInfo {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => FramingInfo::StartAndEndAligned,
            0b01 => FramingInfo::NotEndAligned,
            0b10 => FramingInfo::NotStartAligned,
            _ => FramingInfo::NotStartOrEndAligned,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            FramingInfo::StartAndEndAligned => 0b00,
            FramingInfo::NotEndAligned => 0b01,
            FramingInfo::NotStartAligned => 0b10,
            FramingInfo::NotStartOrEndAligned => 0b11,
        }
    }

    pub fn is_start_aligned(self) -> bool {
        matches!(
            self,
            FramingInfo::StartAndEndAligned | FramingInfo::NotEndAligned
        )
    }

    pub fn is_end_aligned(self) -> bool {
        matches!(
            self,
            FramingInfo::StartAndEndAligned | FramingInfo::NotStartAligned
        )
    }

    /// Combine the start-alignment of `self` with the end-alignment of `other`, used when
    /// reconstructing a synthetic header from a run of segments (first segment's start bit,
    /// last segment's end bit).
    pub fn combine_start_end(first: FramingInfo, last: FramingInfo) -> FramingInfo {
        let start_not_aligned = !first.is_start_aligned();
        let end_not_aligned = !last.is_end_aligned();
        match (start_not_aligned, end_not_aligned) {
            (false, false) => FramingInfo::StartAndEndAligned,
            (false, true) => FramingInfo::NotEndAligned,
            (true, false) => FramingInfo::NotStartAligned,
            (true, true) => FramingInfo::NotStartOrEndAligned,
        }
    }
}

pub const SN_MAX: u16 = 1023;
pub const SO_END_OF_PDU: u16 = 0x7FFF;

/// AMD PDU header, covering both whole-PDU and re-segmented variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmdHeader {
    pub poll: bool,
    pub framing_info: FramingInfo,
    pub sn: u16,
    /// `Some(segment_offset)` iff the re-segment flag is set.
    pub segment: Option<SegmentInfo>,
    /// Length indicators, one boundary per internal SDU end inside this PDU's payload.
    pub li: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub last_segment: bool,
    pub segment_offset: u16,
}

impl AmdHeader {
    pub fn is_segment(&self) -> bool {
        self.segment.is_some()
    }

    /// Packed size of the fixed part only (no LI list), in bytes.
    pub fn fixed_part_len(&self) -> usize {
        if self.segment.is_some() {
            4
        } else {
            2
        }
    }

    /// Packed size of the LI extension part, in bytes: each LI is 11 bits + 1 extension bit,
    /// rounded up to a whole byte.
    pub fn li_part_len(&self) -> usize {
        ((self.li.len() * 12) + 7) / 8
    }

    pub fn packed_len(&self) -> usize {
        self.fixed_part_len() + self.li_part_len()
    }

    pub fn write(&self, w: &mut BitWriter) -> Result<(), Error> {
        if self.sn > SN_MAX {
            return Err(Error::MalformedPdu {
                reason: "SN exceeds 10-bit range",
            });
        }

        w.write_bit(false); // D/C: 0 = data PDU
        w.write_bit(self.segment.is_some()); // RF
        w.write_bit(self.poll); // P
        w.write_bits(self.framing_info.to_bits(), 2); // FI
        w.write_bit(!self.li.is_empty()); // E: another extension (the LI list) follows
        w.write_bits((self.sn as u32) >> 8, 2); // SN high
        w.write_bits((self.sn as u32) & 0xFF, 8); // SN low

        if let Some(seg) = &self.segment {
            if seg.segment_offset > SO_END_OF_PDU {
                return Err(Error::MalformedPdu {
                    reason: "segment offset exceeds 15-bit range",
                });
            }
            w.write_bit(seg.last_segment); // LSF
            w.write_bits((seg.segment_offset as u32) >> 8, 7); // SO high
            w.write_bits((seg.segment_offset as u32) & 0xFF, 8); // SO low
        }

        write_li_list(w, &self.li)?;
        Ok(())
    }

    pub fn read(r: &mut BitReader) -> Result<Self, Error> {
        let dc = r.read_bit()?;
        if dc {
            return Err(Error::MalformedPdu {
                reason: "expected a data PDU but D/C indicated a control PDU",
            });
        }
        let rf = r.read_bit()?;
        let poll = r.read_bit()?;
        let fi = FramingInfo::from_bits(r.read_bits(2)?);
        let mut has_ext = r.read_bit()?;
        let sn_high = r.read_bits(2)?;
        let sn_low = r.read_bits(8)?;
        let sn = ((sn_high << 8) | sn_low) as u16;

        let segment = if rf {
            let lsf = r.read_bit()?;
            let so_high = r.read_bits(7)?;
            let so_low = r.read_bits(8)?;
            Some(SegmentInfo {
                last_segment: lsf,
                segment_offset: ((so_high << 8) | so_low) as u16,
            })
        } else {
            None
        };

        let li = read_li_list(r, has_ext)?;

        Ok(AmdHeader {
            poll,
            framing_info: fi,
            sn,
            segment,
            li,
        })
    }
}

/// LI entries are packed in pairs sharing a three-byte triplet: `E|LI(11)` repeated, then an
/// extra 4 zero bits if the count is odd so the whole header ends byte-aligned. Shared with
/// `crate::um`, whose header carries the same LI extension tail after a shorter SN field.
pub(crate) fn write_li_list(w: &mut BitWriter, li: &[u16]) -> Result<(), Error> {
    for (idx, value) in li.iter().enumerate() {
        if *value >= (1 << 11) {
            return Err(Error::MalformedPdu {
                reason: "LI value exceeds 11-bit range",
            });
        }
        let has_next = idx + 1 < li.len();
        w.write_bit(has_next);
        w.write_bits(*value as u32, 11);
    }
    if li.len() % 2 == 1 {
        w.write_bits(0, 4);
    }
    Ok(())
}

/// Companion to `write_li_list`: `has_ext` is the extension flag already read before the first
/// LI (the AMD fixed part's E bit; UM's equivalent).
pub(crate) fn read_li_list(r: &mut BitReader, mut has_ext: bool) -> Result<Vec<u16>, Error> {
    let mut li = Vec::new();
    while has_ext {
        has_ext = r.read_bit()?;
        let value = r.read_bits(11)?;
        li.push(value as u16);
    }
    if li.len() % 2 == 1 {
        let _ = r.read_bits(4)?;
    }
    Ok(li)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(h: &AmdHeader) -> AmdHeader {
        let mut w = BitWriter::new();
        h.write(&mut w).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        AmdHeader::read(&mut r).unwrap()
    }

    #[test]
    fn roundtrips_plain_pdu_no_li() {
        let h = AmdHeader {
            poll: true,
            framing_info: FramingInfo::StartAndEndAligned,
            sn: 513,
            segment: None,
            li: vec![],
        };
        assert_eq!(roundtrip(&h), h);
    }

    #[test]
    fn roundtrips_with_odd_li_count() {
        let h = AmdHeader {
            poll: false,
            framing_info: FramingInfo::NotEndAligned,
            sn: 7,
            segment: None,
            li: vec![100, 200, 300],
        };
        assert_eq!(roundtrip(&h), h);
    }

    #[test]
    fn roundtrips_with_even_li_count() {
        let h = AmdHeader {
            poll: false,
            framing_info: FramingInfo::NotStartOrEndAligned,
            sn: 1023,
            segment: None,
            li: vec![1, 2, 3, 4],
        };
        assert_eq!(roundtrip(&h), h);
    }

    #[test]
    fn roundtrips_segment_variant() {
        let h = AmdHeader {
            poll: false,
            framing_info: FramingInfo::NotStartAligned,
            sn: 7,
            segment: Some(SegmentInfo {
                last_segment: true,
                segment_offset: 97,
            }),
            li: vec![],
        };
        assert_eq!(roundtrip(&h), h);
    }

    #[test]
    fn rejects_sn_out_of_range() {
        let h = AmdHeader {
            poll: false,
            framing_info: FramingInfo::StartAndEndAligned,
            sn: 1024,
            segment: None,
            li: vec![],
        };
        let mut w = BitWriter::new();
        assert!(h.write(&mut w).is_err());
    }

    #[test]
    fn combine_start_end_picks_outer_bits() {
        let first = FramingInfo::NotStartAligned; // start not aligned, end aligned
        let last = FramingInfo::NotEndAligned; // start aligned, end not aligned
        assert_eq!(
            FramingInfo::combine_start_end(first, last),
            FramingInfo::NotStartOrEndAligned
        );
    }
}
