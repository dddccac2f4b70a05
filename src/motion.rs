//! Displacement between two position samples, per device topology.

/// Number of distinct positions the hardware reports (12 bits).
pub const POSITION_RANGE: i32 = 0x1000;

/// Highest reportable position.
pub const MAX_POSITION: u16 = (POSITION_RANGE - 1) as u16;

/// Largest single-step magnitude on the ring before the shorter path is the
/// one going the other way around.
const MAX_POSITION_CHANGE: i32 = (POSITION_RANGE - 1) / 2;

/// How the sensor positions relate to each other geometrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTopology {
    /// Rotary wheel: positions wrap modulo [`POSITION_RANGE`].
    Ring,
    /// Strip sensor: positions are a plain bounded range.
    Linear,
}

/// Signed displacement from `prev_pos` to `new_pos`.
///
/// On the ring this is the minimal-magnitude path, so crossing the 4095→0
/// seam yields a small delta rather than a near-full-range jump. A tie at
/// exactly half the range resolves to the negative direction (the wrap
/// branch fires first).
pub fn displacement(topology: DeviceTopology, new_pos: u16, prev_pos: u16) -> i32 {
    let mut movement = new_pos as i32 - prev_pos as i32;
    if topology == DeviceTopology::Ring {
        if movement > MAX_POSITION_CHANGE {
            movement -= POSITION_RANGE;
        } else if movement < -MAX_POSITION_CHANGE {
            movement += POSITION_RANGE;
        }
    }
    movement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_is_plain_difference() {
        assert_eq!(displacement(DeviceTopology::Linear, 300, 0), 300);
        assert_eq!(displacement(DeviceTopology::Linear, 0, 300), -300);
        assert_eq!(displacement(DeviceTopology::Linear, 4095, 0), 4095);
    }

    #[test]
    fn ring_wraps_across_the_seam() {
        // forward across 4095 -> 0
        assert_eq!(displacement(DeviceTopology::Ring, 10, 4090), 16);
        // backward across 0 -> 4095
        assert_eq!(displacement(DeviceTopology::Ring, 4090, 10), -16);
        assert_eq!(displacement(DeviceTopology::Ring, 0, 4095), 1);
        assert_eq!(displacement(DeviceTopology::Ring, 4095, 0), -1);
    }

    #[test]
    fn ring_does_not_wrap_short_moves() {
        assert_eq!(displacement(DeviceTopology::Ring, 2000, 1000), 1000);
        assert_eq!(displacement(DeviceTopology::Ring, 1000, 2000), -1000);
    }

    #[test]
    fn ring_half_range_tie_goes_negative() {
        // 2048 is exactly half the range; the wrap branch claims it.
        assert_eq!(displacement(DeviceTopology::Ring, 2048, 0), 2048 - 4096);
        assert_eq!(displacement(DeviceTopology::Ring, 2047, 0), 2047);
    }

    #[test]
    fn ring_magnitude_bounded_and_antisymmetric() {
        // exhaustive over a coarse grid plus the interesting rim
        let probes: Vec<u16> = (0..=4095).step_by(97).chain([0, 1, 2047, 2048, 4094, 4095]).collect();
        for &a in &probes {
            for &b in &probes {
                let d = displacement(DeviceTopology::Ring, a, b);
                assert!(d.abs() <= 2048, "|d({a},{b})| = {} > 2048", d.abs());
                let r = displacement(DeviceTopology::Ring, b, a);
                assert_eq!(d, -r, "d({a},{b}) != -d({b},{a})");
            }
        }
    }

    #[test]
    fn ring_consistent_with_modular_distance() {
        for (prev, new) in [(4090u16, 10u16), (10, 4090), (0, 2000), (3000, 500)] {
            let d = displacement(DeviceTopology::Ring, new, prev);
            // walking d steps (mod range) from prev must land on new
            let landed = (prev as i32 + d).rem_euclid(POSITION_RANGE) as u16;
            assert_eq!(landed, new);
        }
    }
}
