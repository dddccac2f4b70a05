use anyhow::Result;
use log::{error, info, warn};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use super::server::DaemonEvent;
use crate::config::Profile;
use crate::device::{self, DetectError, DeviceKind};
use crate::emitter::UinputSink;
use crate::packet::{self, PACKET_SIZE};
use crate::ps2::{self, Ps2Port, SerioPort};
use crate::session::{LogTrace, TouchSession};

const RESCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Device thread entry point: find a scroll device, stream its packets
/// through the state machine, survive transport hiccups by resetting.
pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    tx_evt: std::sync::mpsc::Sender<DaemonEvent>,
) -> Result<()> {
    // one virtual device for the daemon's lifetime; reconnects must not
    // re-register it with the host
    let mut sink = UinputSink::new().unwrap_or_else(|_| UinputSink::noop());

    loop {
        let Some((mut port, kind)) = attach_first_device() else {
            warn!("no Fujitsu scroll device on any serio_raw port; rescanning");
            thread::sleep(RESCAN_INTERVAL);
            continue;
        };
        let _ = tx_evt.send(DaemonEvent::Log(format!("attached {}", kind.name())));

        loop {
            match serve_device(&mut port, kind, &profile, &mut sink) {
                Ok(()) => unreachable!("packet loop only exits on error"),
                Err(e) => {
                    warn!("device stream ended: {e}");
                    if reconnect(&mut port).is_ok() {
                        // fresh session after a reset; the old touch state
                        // is meaningless for the reinitialized device
                        info!("device reset, resuming with a new session");
                        continue;
                    }
                    let _ = tx_evt.send(DaemonEvent::Log(format!("detached {}", kind.name())));
                    break;
                }
            }
        }
    }
}

fn attach_first_device() -> Option<(SerioPort, DeviceKind)> {
    for path in ps2::discover() {
        let mut port = match SerioPort::open(&path) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to open {}: {e}", path.display());
                continue;
            }
        };
        match probe(&mut port) {
            Ok(kind) => {
                info!("{}: found {}", path.display(), kind.name());
                return Some((port, kind));
            }
            Err(e) => info!("{}: {e}", path.display()),
        }
    }
    None
}

fn probe(port: &mut SerioPort) -> Result<DeviceKind, DetectError> {
    device::detect(port)?;
    let kind = device::query_kind(port)?;
    device::init_sequence(port)?;
    Ok(kind)
}

fn reconnect(port: &mut SerioPort) -> Result<()> {
    port.reset()?;
    device::init_sequence(port)?;
    Ok(())
}

/// Run-to-completion per packet: read, decode, step the session, emit at
/// most one event, then one sync marker. Returns only on transport error.
fn serve_device(
    port: &mut dyn Ps2Port,
    kind: DeviceKind,
    profile: &Arc<Mutex<Profile>>,
    sink: &mut UinputSink,
) -> Result<()> {
    let mut session = TouchSession::new(kind);
    let trace = LogTrace;
    let mut buf = [0u8; PACKET_SIZE];

    loop {
        port.read_packet(&mut buf)?;
        let sample = packet::decode(&buf);
        let th = { profile.lock().unwrap().thresholds.clone() };
        if let Some(ev) = session.process(&th, &sample, &trace) {
            if let Err(e) = sink.emit(&ev) {
                error!("emit failed: {e}");
            }
        }
        if let Err(e) = sink.sync() {
            error!("sync failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Meta;
    use crate::ps2::testutil::ScriptedPort;

    fn default_profile() -> Arc<Mutex<Profile>> {
        Arc::new(Mutex::new(Profile {
            meta: Meta { name: None },
            thresholds: crate::config::Thresholds::default(),
        }))
    }

    #[test]
    fn sink_survives_device_stream_errors() {
        let profile = default_profile();
        let mut sink = UinputSink::noop();

        // two idle packets, then the stream dries up
        let mut port = ScriptedPort::new(&[0u8; 12]);
        let err = serve_device(&mut port, DeviceKind::Wheel, &profile, &mut sink);
        assert!(err.is_err());

        // the same sink carries over to the next attach without re-creation
        let mut port = ScriptedPort::new(&[0u8; 6]);
        let err = serve_device(&mut port, DeviceKind::Wheel, &profile, &mut sink);
        assert!(err.is_err());
        assert!(sink.sync().is_ok());
    }
}
