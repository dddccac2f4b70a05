//! Identification and bring-up of the Fujitsu scroll devices.
//!
//! Two hardware variants exist on the supported laptops: a rotary scroll
//! wheel and a flat scroll strip. Both answer the same magic id; a second
//! query distinguishes them and fixes the topology and output axis for the
//! life of the session.

use thiserror::Error;

use crate::motion::DeviceTopology;
use crate::ps2::{self, CMD_GETINFO, CMD_SETRATE, CMD_SETRES, Ps2Error, Ps2Port};

/// GETINFO byte 1 shared by both variants.
pub const DEVICE_ID: u8 = 0x43;
/// Sub-id returned by the wheel variant.
pub const WHEEL_ID: u8 = 0x04;
/// Sub-id returned by the strip sensor variant.
pub const SENSOR_ID: u8 = 0x00;

/// Mode byte that switches the device into streaming data packets.
const INIT_MODE: u8 = 0x80;
/// Report rate requested after enabling data mode.
const INIT_RATE: u8 = 0x14;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("not a Fujitsu scroll device (id bytes {0:02x?})")]
    NotPresent([u8; 3]),
    #[error(transparent)]
    Transport(#[from] Ps2Error),
}

/// Which relative axis the host sees events on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    /// Vertical wheel (the rotary wheel reports here).
    Vertical,
    /// Horizontal wheel (the strip sensor reports here).
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Wheel,
    Sensor,
}

impl DeviceKind {
    pub fn topology(self) -> DeviceTopology {
        match self {
            DeviceKind::Wheel => DeviceTopology::Ring,
            DeviceKind::Sensor => DeviceTopology::Linear,
        }
    }

    pub fn axis(self) -> ScrollAxis {
        match self {
            DeviceKind::Wheel => ScrollAxis::Vertical,
            DeviceKind::Sensor => ScrollAxis::Horizontal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Wheel => "scroll wheel",
            DeviceKind::Sensor => "scroll sensor",
        }
    }
}

/// Probe the port for one of these devices. Four SETRES commands followed by
/// GETINFO form the recognition knock; byte 1 of the reply carries the id.
pub fn detect(port: &mut dyn Ps2Port) -> Result<(), DetectError> {
    let mut info = [0u8; 3];
    for _ in 0..4 {
        port.command(CMD_SETRES, &[0], &mut [])?;
    }
    port.command(CMD_GETINFO, &[], &mut info)?;
    if info[1] != DEVICE_ID {
        return Err(DetectError::NotPresent(info));
    }
    Ok(())
}

/// Ask a recognized device which variant it is.
pub fn query_kind(port: &mut dyn Ps2Port) -> Result<DeviceKind, DetectError> {
    let mut info = [0u8; 3];
    ps2::sliced_command(port, 0)?;
    port.command(CMD_GETINFO, &[], &mut info)?;
    Ok(if info[0] == WHEEL_ID {
        DeviceKind::Wheel
    } else {
        DeviceKind::Sensor
    })
}

/// Switch the device into data-packet mode.
pub fn init_sequence(port: &mut dyn Ps2Port) -> Result<(), Ps2Error> {
    ps2::sliced_command(port, INIT_MODE)?;
    port.command(CMD_SETRATE, &[INIT_RATE], &mut [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps2::testutil::ScriptedPort;

    #[test]
    fn detect_accepts_the_magic_id() {
        let mut port = ScriptedPort::new(&[0x00, DEVICE_ID, 0x00]);
        assert!(detect(&mut port).is_ok());
        // four SETRES(0) knocks then GETINFO
        assert_eq!(
            port.written,
            vec![
                CMD_SETRES, 0, CMD_SETRES, 0, CMD_SETRES, 0, CMD_SETRES, 0, CMD_GETINFO
            ]
        );
    }

    #[test]
    fn detect_rejects_other_hardware() {
        let mut port = ScriptedPort::new(&[0x00, 0x47, 0x00]);
        match detect(&mut port) {
            Err(DetectError::NotPresent(info)) => assert_eq!(info[1], 0x47),
            other => panic!("expected NotPresent, got {other:?}"),
        }
    }

    #[test]
    fn query_distinguishes_wheel_from_sensor() {
        let mut port = ScriptedPort::new(&[WHEEL_ID, 0x00, 0x00]);
        assert_eq!(query_kind(&mut port).unwrap(), DeviceKind::Wheel);

        let mut port = ScriptedPort::new(&[SENSOR_ID, 0x00, 0x00]);
        assert_eq!(query_kind(&mut port).unwrap(), DeviceKind::Sensor);
    }

    #[test]
    fn kind_fixes_topology_and_axis() {
        use crate::motion::DeviceTopology;
        assert_eq!(DeviceKind::Wheel.topology(), DeviceTopology::Ring);
        assert_eq!(DeviceKind::Wheel.axis(), ScrollAxis::Vertical);
        assert_eq!(DeviceKind::Sensor.topology(), DeviceTopology::Linear);
        assert_eq!(DeviceKind::Sensor.axis(), ScrollAxis::Horizontal);
    }

    #[test]
    fn init_sequence_slices_the_mode_byte_then_sets_rate() {
        let mut port = ScriptedPort::new(&[]);
        init_sequence(&mut port).unwrap();
        let n = port.written.len();
        assert_eq!(&port.written[n - 2..], &[CMD_SETRATE, 0x14]);
        assert_eq!(port.written[0], crate::ps2::CMD_SETSCALE11);
    }
}
