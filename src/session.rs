//! Touch lifecycle state machine.
//!
//! One `TouchSession` per attached device, fed one decoded sample per packet.
//! A touch begins when capacitance crosses the activation threshold, tracks
//! displacement against the last emitted position, and ends when capacitance
//! drops back below. Two sticky per-touch latches gate emission:
//!
//! * `changed_enough` — set once the finger has moved far enough from its
//!   landing point; an accidental brush never scrolls.
//! * `ignore_event` — set by any suppression trigger (edge guard engaged at
//!   or during the touch, palm-level capacitance); once tainted, a touch
//!   stays silent until the finger lifts.

use log::debug;

use crate::config::Thresholds;
use crate::device::{DeviceKind, ScrollAxis};
use crate::motion::{DeviceTopology, displacement};
use crate::packet::DecodedSample;

/// One relative scroll step batch, ready for the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEvent {
    pub axis: ScrollAxis,
    pub delta: i32,
}

/// Why a touch stopped producing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The touch began while the guard area was already engaged.
    GuardAtStart,
    /// The guard area was touched mid-touch.
    GuardTouched,
    /// Capacitance above the palm threshold.
    PalmContact,
}

/// Observability hook invoked at the state machine's decision points.
/// Default methods are no-ops so pure callers pay nothing.
pub trait SessionTrace {
    fn touch_start(&self, _position: u16, _ignored: bool) {}
    fn moved_past_threshold(&self, _position: u16) {}
    fn touch_suppressed(&self, _reason: SuppressReason, _position: u16) {}
    fn guard_edge(&self, _touched: bool, _position: u16) {}
    fn touch_end(&self, _position: u16, _moved: i32, _capacitance_avg: u8) {}
}

/// Trace that does nothing; for tests and offline decoding.
pub struct NoopTrace;

impl SessionTrace for NoopTrace {}

/// Trace that forwards to the `log` facade at debug level.
pub struct LogTrace;

impl SessionTrace for LogTrace {
    fn touch_start(&self, position: u16, ignored: bool) {
        debug!("touch start pos {position} ignored {ignored}");
    }
    fn moved_past_threshold(&self, position: u16) {
        debug!("past movement threshold pos {position}");
    }
    fn touch_suppressed(&self, reason: SuppressReason, position: u16) {
        debug!("touch suppressed ({reason:?}) pos {position}");
    }
    fn guard_edge(&self, touched: bool, position: u16) {
        debug!(
            "guard touch {} pos {position}",
            if touched { "start" } else { "end" }
        );
    }
    fn touch_end(&self, position: u16, moved: i32, capacitance_avg: u8) {
        debug!("touch end pos {position} moved {moved} cap avg {capacitance_avg}");
    }
}

/// Per-device state. Created on attach, discarded on detach or reset; the
/// topology and axis never change while it lives.
#[derive(Debug)]
pub struct TouchSession {
    topology: DeviceTopology,
    axis: ScrollAxis,
    finger_down: bool,
    last_event_position: u16,
    event_start_position: u16,
    changed_enough: bool,
    ignore_event: bool,
    guard_touched_prev: bool,
    /// Smoothed contact weight. Diagnostic only, never gates emission.
    capacitance_avg: u8,
}

impl TouchSession {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            topology: kind.topology(),
            axis: kind.axis(),
            finger_down: false,
            last_event_position: 0,
            event_start_position: 0,
            changed_enough: false,
            ignore_event: false,
            guard_touched_prev: false,
            capacitance_avg: 0,
        }
    }

    pub fn axis(&self) -> ScrollAxis {
        self.axis
    }

    pub fn finger_down(&self) -> bool {
        self.finger_down
    }

    /// Advance the session by one packet. Returns at most one event.
    pub fn process(
        &mut self,
        th: &Thresholds,
        sample: &DecodedSample,
        trace: &dyn SessionTrace,
    ) -> Option<MotionEvent> {
        if sample.edge_guard_touched != self.guard_touched_prev {
            trace.guard_edge(sample.edge_guard_touched, sample.position);
        }

        let mut event = None;

        if sample.capacitance >= th.capacitance_threshold {
            if !self.finger_down {
                self.finger_down = true;
                self.last_event_position = sample.position;
                self.event_start_position = sample.position;
                self.ignore_event = self.guard_touched_prev;
                self.capacitance_avg = sample.capacitance;
                if self.ignore_event {
                    trace.touch_suppressed(SuppressReason::GuardAtStart, sample.position);
                }
                trace.touch_start(sample.position, self.ignore_event);
            } else {
                let movement =
                    displacement(self.topology, sample.position, self.last_event_position);
                let movement_since_start =
                    displacement(self.topology, sample.position, self.event_start_position);

                if !self.changed_enough
                    && movement_since_start.abs() > th.movement_hysteresis_threshold
                {
                    // one-way latch for the rest of the touch
                    self.changed_enough = true;
                    trace.moved_past_threshold(sample.position);
                }

                if sample.edge_guard_touched && !self.ignore_event {
                    self.ignore_event = true;
                    trace.touch_suppressed(SuppressReason::GuardTouched, sample.position);
                }

                if sample.capacitance > th.palm_ignore_threshold && !self.ignore_event {
                    self.ignore_event = true;
                    trace.touch_suppressed(SuppressReason::PalmContact, sample.position);
                }

                if self.changed_enough {
                    // Sign inversion maps sensor coordinate growth to the
                    // scroll direction the host expects. Truncating division:
                    // remainders stay in last_event_position's frame until
                    // they add up to a full step.
                    let device_movement = -(movement / th.movement_divisor);
                    if device_movement != 0 && !self.ignore_event {
                        event = Some(MotionEvent {
                            axis: self.axis,
                            delta: device_movement,
                        });
                        self.last_event_position = sample.position;
                    }
                    self.capacitance_avg =
                        ((self.capacitance_avg as u16 * 7 + sample.capacitance as u16) / 8) as u8;
                }
            }
        } else if self.finger_down {
            if sample.edge_guard_touched {
                self.ignore_event = true;
            }
            let moved = if self.changed_enough {
                displacement(self.topology, sample.position, self.event_start_position)
            } else {
                0
            };
            trace.touch_end(sample.position, moved, self.capacitance_avg);
            self.finger_down = false;
            self.changed_enough = false;
            self.ignore_event = false;
        }

        self.guard_touched_prev = sample.edge_guard_touched;
        event
    }
}
