//! The calibration-button edge flag: the only interrupt source this
//! controller observes. The ISR sets it; the main loop atomically consumes
//! it once per tick. Modeled as a single `AtomicBool`, the same pattern the
//! teacher firmware uses for its ISR-to-main-loop arm/disarm flags.

use core::sync::atomic::{AtomicBool, Ordering};

/// Set from interrupt context on a calibration-button edge; cleared by the
/// main loop. No other shared mutable state crosses the interrupt boundary.
static CALIBRATE_PRESSED: AtomicBool = AtomicBool::new(false);

/// Call from the GPIO edge ISR.
pub fn on_calibration_edge() {
    CALIBRATE_PRESSED.store(true, Ordering::SeqCst);
}

/// Atomically read-and-clear the flag. Call once per tick, before driving
/// the FSM, so a button press observed this tick can't be double-counted
/// next tick.
pub fn take() -> bool {
    CALIBRATE_PRESSED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    // `CALIBRATE_PRESSED` is a single process-wide static, so the two cases
    // below share one test to avoid racing each other under cargo's
    // multi-threaded test runner.
    #[test]
    fn take_clears_and_collapses_repeated_edges() {
        on_calibration_edge();
        assert!(take());
        assert!(!take());

        on_calibration_edge();
        on_calibration_edge();
        assert!(take());
        assert!(!take());
    }
}
