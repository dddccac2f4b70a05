//! PS/2 transport over the kernel's serio_raw interface.
//!
//! `serio_raw` hands us the raw byte stream of one serio port: every byte we
//! write goes to the device, every byte the device sends comes back on read.
//! The device acknowledges each received byte with 0xFA before sending any
//! response data.

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    path::PathBuf,
};

use thiserror::Error;

pub const CMD_SETSCALE11: u8 = 0xe6;
pub const CMD_SETRES: u8 = 0xe8;
pub const CMD_GETINFO: u8 = 0xe9;
pub const CMD_SETRATE: u8 = 0xf3;
pub const CMD_RESET: u8 = 0xff;

const ACK: u8 = 0xfa;

#[derive(Debug, Error)]
pub enum Ps2Error {
    #[error("serio I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("device answered 0x{0:02x} where 0xfa (ACK) was expected")]
    Nack(u8),
}

/// Command/response access to one PS/2 port.
///
/// Split out as a trait so device detection and the init sequence can be
/// exercised against a scripted port in tests.
pub trait Ps2Port {
    /// Send `cmd` followed by `send`, then read `recv.len()` response bytes.
    fn command(&mut self, cmd: u8, send: &[u8], recv: &mut [u8]) -> Result<(), Ps2Error>;

    /// Block until one full data packet has been received.
    fn read_packet(&mut self, buf: &mut [u8; crate::packet::PACKET_SIZE]) -> Result<(), Ps2Error>;
}

/// Encode one byte as a "sliced" command: SETSCALE11 followed by four SETRES
/// commands carrying two bits each, high bits first. This is how extended
/// mode bytes reach the device (libps2 does the same on the kernel side).
pub fn sliced_command(port: &mut dyn Ps2Port, byte: u8) -> Result<(), Ps2Error> {
    port.command(CMD_SETSCALE11, &[], &mut [])?;
    for i in 0..4 {
        let chunk = (byte >> (6 - 2 * i)) & 0x03;
        port.command(CMD_SETRES, &[chunk], &mut [])?;
    }
    Ok(())
}

/// A serio_raw character device node.
pub struct SerioPort {
    file: File,
}

impl SerioPort {
    pub fn open(path: &PathBuf) -> Result<Self, Ps2Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Reset the device and swallow the self-test reply (0xAA plus the
    /// device id byte).
    pub fn reset(&mut self) -> Result<(), Ps2Error> {
        let mut reply = [0u8; 2];
        self.command(CMD_RESET, &[], &mut reply)?;
        Ok(())
    }

    fn write_acked(&mut self, byte: u8) -> Result<(), Ps2Error> {
        self.file.write_all(&[byte])?;
        let mut ack = [0u8; 1];
        self.file.read_exact(&mut ack)?;
        if ack[0] != ACK {
            return Err(Ps2Error::Nack(ack[0]));
        }
        Ok(())
    }
}

impl Ps2Port for SerioPort {
    fn command(&mut self, cmd: u8, send: &[u8], recv: &mut [u8]) -> Result<(), Ps2Error> {
        self.write_acked(cmd)?;
        for &b in send {
            self.write_acked(b)?;
        }
        if !recv.is_empty() {
            self.file.read_exact(recv)?;
        }
        Ok(())
    }

    fn read_packet(&mut self, buf: &mut [u8; crate::packet::PACKET_SIZE]) -> Result<(), Ps2Error> {
        self.file.read_exact(buf)?;
        Ok(())
    }
}

/// List the serio_raw nodes currently present.
pub fn discover() -> Vec<PathBuf> {
    let mut out = vec![];
    if let Ok(rd) = fs::read_dir("/dev") {
        for e in rd.flatten() {
            let p = e.path();
            if p.file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with("serio_raw"))
                .unwrap_or(false)
            {
                out.push(p);
            }
        }
    }
    out.sort();
    out
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Scripted port: records every command byte written and serves canned
    /// response bytes in order.
    pub struct ScriptedPort {
        pub written: Vec<u8>,
        pub responses: Vec<u8>,
        cursor: usize,
    }

    impl ScriptedPort {
        pub fn new(responses: &[u8]) -> Self {
            Self {
                written: vec![],
                responses: responses.to_vec(),
                cursor: 0,
            }
        }

        fn next(&mut self) -> u8 {
            let b = self.responses.get(self.cursor).copied().unwrap_or(0);
            self.cursor += 1;
            b
        }
    }

    impl Ps2Port for ScriptedPort {
        fn command(&mut self, cmd: u8, send: &[u8], recv: &mut [u8]) -> Result<(), Ps2Error> {
            self.written.push(cmd);
            self.written.extend_from_slice(send);
            for slot in recv.iter_mut() {
                *slot = self.next();
            }
            Ok(())
        }

        fn read_packet(
            &mut self,
            buf: &mut [u8; crate::packet::PACKET_SIZE],
        ) -> Result<(), Ps2Error> {
            // exhausting the script plays like the device going away
            if self.cursor + buf.len() > self.responses.len() {
                return Err(Ps2Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            for slot in buf.iter_mut() {
                *slot = self.next();
            }
            Ok(())
        }
    }
}
