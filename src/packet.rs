//! Wire packet decoding for the Fujitsu scroll devices.
//!
//! The device streams fixed-size 6-byte packets once data mode is enabled.
//! Only three fields matter to us; the remaining bytes are reserved by the
//! hardware and never interpreted here.

pub const PACKET_SIZE: usize = 6;

/// Fields extracted from one raw packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedSample {
    /// 12-bit absolute position, 0..=4095. An angle on the wheel, an offset
    /// on the strip sensor.
    pub position: u16,
    /// 6-bit contact weight, 0..=63.
    pub capacitance: u8,
    /// Set while the finger rests on the guard area around the sensor edge.
    pub edge_guard_touched: bool,
}

/// Decode one packet. Total over all inputs: the transport guarantees
/// framing, so any 6 bytes are a syntactically valid sample.
pub fn decode(packet: &[u8; PACKET_SIZE]) -> DecodedSample {
    DecodedSample {
        position: (((packet[1] & 0x0f) as u16) << 8) | packet[2] as u16,
        capacitance: packet[0] & 0x3f,
        edge_guard_touched: packet[4] & 0x10 != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_spans_two_bytes() {
        let s = decode(&[0x00, 0x0a, 0xbc, 0x00, 0x00, 0x00]);
        assert_eq!(s.position, 0xabc);
    }

    #[test]
    fn position_ignores_high_nibble_of_byte_1() {
        let s = decode(&[0x00, 0xfa, 0xbc, 0x00, 0x00, 0x00]);
        assert_eq!(s.position, 0xabc);
    }

    #[test]
    fn capacitance_masks_to_six_bits() {
        let s = decode(&[0xff, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(s.capacitance, 0x3f);
        let s = decode(&[0x25, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(s.capacitance, 0x25);
    }

    #[test]
    fn guard_flag_is_bit_4_of_byte_4() {
        assert!(decode(&[0, 0, 0, 0, 0x10, 0]).edge_guard_touched);
        assert!(decode(&[0, 0, 0, 0, 0xff, 0]).edge_guard_touched);
        assert!(!decode(&[0, 0, 0, 0, 0xef, 0]).edge_guard_touched);
        assert!(!decode(&[0, 0, 0, 0, 0x00, 0]).edge_guard_touched);
    }

    #[test]
    fn unused_bytes_do_not_leak_into_fields() {
        let s = decode(&[0x00, 0x00, 0x00, 0xff, 0x00, 0xff]);
        assert_eq!(s.position, 0);
        assert_eq!(s.capacitance, 0);
        assert!(!s.edge_guard_touched);
    }
}
