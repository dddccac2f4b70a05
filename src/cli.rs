use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, fs, process::Command};

use crate::device::{DeviceKind, ScrollAxis};
use crate::ipc;
use crate::packet::{self, PACKET_SIZE};
use crate::session::{NoopTrace, TouchSession};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("fjscroll: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fjscroll use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("decode") => {
            let hex: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fjscroll decode <12 hex digits>"))?;
            let raw = parse_packet_hex(&hex)?;
            let s = packet::decode(&raw);
            print_response(&serde_json::json!({
                "position": s.position,
                "capacitance": s.capacitance,
                "edge_guard_touched": s.edge_guard_touched,
            }));
            Ok(())
        }

        Some("replay") => {
            let sensor = pargs.contains("--sensor");
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fjscroll replay [--sensor] <packet_dump>"))?;
            let kind = if sensor {
                DeviceKind::Sensor
            } else {
                DeviceKind::Wheel
            };
            replay(&path, kind)
        }

        Some("emit") => {
            // usage: fjscroll emit scroll <steps> [--horizontal]
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fjscroll emit scroll <steps> [--horizontal]"))?;
            if what != "scroll" {
                return Err(anyhow!("unknown emit kind: {what}"));
            }
            let horizontal = pargs.contains("--horizontal");
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fjscroll emit scroll <steps> [--horizontal]"))?;
            let axis = if horizontal {
                ScrollAxis::Horizontal
            } else {
                ScrollAxis::Vertical
            };
            let mut sink = crate::emitter::UinputSink::new()?;
            sink.scroll(axis, steps)?;
            sink.sync()?;
            println!("ok: scrolled {axis:?} {steps}");
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Feed a hex packet dump through a fresh session with the default
/// thresholds and print every event it would have produced.
fn replay(path: &str, kind: DeviceKind) -> Result<()> {
    let th = crate::config::Thresholds::default();
    let mut session = TouchSession::new(kind);
    let txt = fs::read_to_string(path).map_err(|e| anyhow!("failed to read {path}: {e}"))?;

    let mut packets = 0usize;
    let mut events = 0usize;
    for (lineno, line) in txt.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let raw = parse_packet_hex(line)
            .map_err(|e| anyhow!("{path}:{}: {e}", lineno + 1))?;
        let sample = packet::decode(&raw);
        packets += 1;
        if let Some(ev) = session.process(&th, &sample, &NoopTrace) {
            events += 1;
            println!("packet {packets}: {:?} {:+}", ev.axis, ev.delta);
        }
    }
    println!("{packets} packets, {events} events");
    Ok(())
}

fn parse_packet_hex(s: &str) -> Result<[u8; PACKET_SIZE]> {
    // work on raw bytes; the input is user text and need not be ASCII
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() != PACKET_SIZE * 2 {
        return Err(anyhow!(
            "expected {} hex digits, got {}",
            PACKET_SIZE * 2,
            digits.len()
        ));
    }
    let mut out = [0u8; PACKET_SIZE];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        if !pair.iter().all(u8::is_ascii_hexdigit) {
            return Err(anyhow!("invalid hex byte at position {i}"));
        }
        out[i] = u8::from_str_radix(std::str::from_utf8(pair)?, 16)?;
    }
    Ok(out)
}

fn print_help() {
    println!(
        r#"fjscroll — userspace driver for Fujitsu PS/2 scroll devices

USAGE:
  fjscroll help [command]                Show general or command-specific help
  fjscroll start                         Start the daemon
  fjscroll stop                          Stop the daemon
  fjscroll status                        Show daemon state
  fjscroll reload                        Reload active profile
  fjscroll use <name>                    Switch active profile
  fjscroll list                          List profiles
  fjscroll doctor                        Diagnose permissions/ports
  fjscroll decode <hex>                  Decode one 6-byte packet (12 hex digits)
  fjscroll replay [--sensor] <file>      Replay a packet dump through the state machine
  fjscroll emit scroll <steps> [--horizontal]  Emit scroll steps via uinput

TIPS:
  - Bind the device: echo -n serio_raw | sudo tee /sys/bus/serio/devices/serioN/drvctl
  - Profiles: ~/.config/fjscroll/profiles
  - Active profile pointer: ~/.config/fjscroll/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: fjscroll start\nStarts the background daemon."),
        "stop" => println!("usage: fjscroll stop\nStops the running daemon."),
        "status" => println!(
            "usage: fjscroll status\nShows enabled flag, active profile, serio ports, socket."
        ),
        "reload" => println!(
            "usage: fjscroll reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: fjscroll use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: fjscroll list\nLists available profiles.")
        }
        "doctor" => println!(
            "usage: fjscroll doctor\nChecks permissions and lists serio_raw ports."
        ),
        "decode" => println!(
            "usage: fjscroll decode <12 hex digits>\nDecodes one raw packet and prints the fields."
        ),
        "replay" => println!(
            "usage: fjscroll replay [--sensor] <file>\nFeeds a dump (one hex packet per line, '#' comments) through\na fresh session with default thresholds. Wheel topology unless --sensor."
        ),
        "emit" => println!(
            "usage: fjscroll emit scroll <steps> [--horizontal]\nSends scroll steps through the uinput device."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_hex_roundtrip() {
        let raw = parse_packet_hex("140abc001000").unwrap();
        assert_eq!(raw, [0x14, 0x0a, 0xbc, 0x00, 0x10, 0x00]);
        let s = packet::decode(&raw);
        assert_eq!(s.position, 0xabc);
        assert_eq!(s.capacitance, 0x14);
        assert!(s.edge_guard_touched);
    }

    #[test]
    fn packet_hex_allows_spacing() {
        let raw = parse_packet_hex("14 0a bc 00 10 00").unwrap();
        assert_eq!(raw[2], 0xbc);
    }

    #[test]
    fn packet_hex_rejects_bad_lengths() {
        assert!(parse_packet_hex("140abc").is_err());
        assert!(parse_packet_hex("140abc0010000000").is_err());
        assert!(parse_packet_hex("zz0abc001000").is_err());
    }

    #[test]
    fn packet_hex_rejects_non_ascii() {
        // four 3-byte chars hit the 12-byte length check exactly; this must
        // report an error, not panic on a char boundary
        assert!(parse_packet_hex("€€€€").is_err());
        assert!(parse_packet_hex("14 0a bc 00 10 €").is_err());
    }
}
