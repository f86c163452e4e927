//! The dot-matrix display mirror: one glyph (or short label) per FSM state,
//! written only on state change, never every tick. This is the external
//! collaborator named in §1 — its only contract with the core is this
//! one-way mapping. No feedback from the display ever reaches the control
//! plane.

use crate::fsm::LockState;

/// Hardware seam for the display. The ESP-IDF adapter
/// (`drivers::max7219_display`) drives a MAX7219-style dot-matrix module
/// over SPI; tests use `test_support::RecordingDisplay`.
pub trait DisplayPort {
    fn show(&mut self, state: LockState);
}

/// Tracks the last state shown and only calls through to the underlying
/// `DisplayPort` when it changes, per the control loop's step 7.
pub struct DisplayMirror<D: DisplayPort> {
    pub(crate) port: D,
    last_shown: Option<LockState>,
}

impl<D: DisplayPort> DisplayMirror<D> {
    pub fn new(port: D) -> Self {
        Self {
            port,
            last_shown: None,
        }
    }

    /// Update the display if and only if `state` differs from what was
    /// last shown.
    pub fn update(&mut self, state: LockState) {
        if self.last_shown != Some(state) {
            self.port.show(state);
            self.last_shown = Some(state);
        }
    }
}
