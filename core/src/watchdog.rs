//! Thin wrapper over the hardware task watchdog. A tick that fails to
//! refresh this within `WATCHDOG_TIMEOUT_MS` forces a reset; persistent
//! auth state survives, and the FSM restarts at `CalibrateLock`.

use crate::error::Result;

/// Hardware seam for the watchdog. The ESP-IDF adapter
/// (`drivers::task_watchdog`) wraps `esp_idf_svc::hal::task::watchdog`;
/// tests use `test_support::CountingWatchdog`, which just counts refreshes.
pub trait WatchdogPort {
    fn feed(&mut self) -> Result<()>;
}
