//! Property tests for wire-format round-trips and SN-space arithmetic invariants, using the
//! `proptest` dev-dependency the way the pack's examples reach for it to fuzz binary codecs.

use proptest::prelude::*;
use rlc_am::{
    AmdHeader, BitReader, BitWriter, FramingInfo, NackRange, SegmentInfo, SnSpace, StatusPdu,
    AM_SN_MODULUS,
};

fn framing_info() -> impl Strategy<Value = FramingInfo> {
    prop_oneof![
        Just(FramingInfo::StartAndEndAligned),
        Just(FramingInfo::NotEndAligned),
        Just(FramingInfo::NotStartAligned),
        Just(FramingInfo::NotStartOrEndAligned),
    ]
}

fn li_list() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(0u16..2047, 0..6)
}

fn amd_header() -> impl Strategy<Value = AmdHeader> {
    (
        any::<bool>(),
        framing_info(),
        0u16..1024,
        li_list(),
        proptest::option::of((any::<bool>(), 0u16..0x7FFF)),
    )
        .prop_map(|(poll, framing_info, sn, li, segment)| AmdHeader {
            poll,
            framing_info,
            sn,
            segment: segment.map(|(last_segment, segment_offset)| SegmentInfo {
                last_segment,
                segment_offset,
            }),
            li,
        })
}

fn nack_range() -> impl Strategy<Value = NackRange> {
    (0u16..1024, proptest::option::of((0u16..0x7FFF, 0u16..0x7FFF))).prop_map(|(sn, so)| {
        NackRange {
            sn,
            so: so.map(|(a, b)| if a <= b { (a, b) } else { (b, a) }),
        }
    })
}

fn status_pdu() -> impl Strategy<Value = StatusPdu> {
    (0u16..1024, prop::collection::vec(nack_range(), 0..8))
        .prop_map(|(ack_sn, nacks)| StatusPdu { ack_sn, nacks })
}

proptest! {
    #[test]
    fn amd_header_round_trips(header in amd_header()) {
        let mut w = BitWriter::new();
        header.write(&mut w).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let decoded = AmdHeader::read(&mut r).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn status_pdu_round_trips(status in status_pdu()) {
        let mut w = BitWriter::new();
        status.write(&mut w).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let decoded = StatusPdu::read(&mut r).unwrap();
        prop_assert_eq!(decoded, status);
    }

    /// `is_inside` must agree with `diff_mod`'s own ordering: a SN is inside `[low, high)` iff
    /// its forward distance from `low` is smaller than `high`'s forward distance from `low`.
    #[test]
    fn is_inside_matches_diff_mod_ordering(low in 0u32..AM_SN_MODULUS, span in 0u32..600, sn in 0u32..AM_SN_MODULUS) {
        let space = SnSpace::new(AM_SN_MODULUS);
        let high = space.advance(low, span);
        let inside = space.is_inside(low, high, sn);
        let expected = space.diff_mod(low, sn) < space.diff_mod(low, high);
        prop_assert_eq!(inside, expected);
    }

    /// `advance` by zero is the identity and `diff_mod(sn, sn)` is always zero, regardless of
    /// where in the modulus `sn` falls.
    #[test]
    fn advance_zero_is_identity(sn in 0u32..AM_SN_MODULUS) {
        let space = SnSpace::new(AM_SN_MODULUS);
        prop_assert_eq!(space.advance(sn, 0), sn);
        prop_assert_eq!(space.diff_mod(sn, sn), 0);
    }
}
