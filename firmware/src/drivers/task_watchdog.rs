//! Binds `watchdog::WatchdogPort` to the ESP-IDF task watchdog timer.

use esp_idf_svc::hal::task::watchdog::{TWDTConfig, TWDTDriver, WatchdogSubscription};

use boltguard_core::error::{ControllerError, Result};

pub struct TaskWatchdog<'a> {
    subscription: WatchdogSubscription<'a>,
}

impl<'a> TaskWatchdog<'a> {
    pub fn new(driver: &'a TWDTDriver<'a>) -> Result<Self> {
        let subscription = driver
            .watch_current_task()
            .map_err(|e| ControllerError::Watchdog(e.to_string()))?;
        Ok(Self { subscription })
    }

    pub fn config(timeout_ms: u32) -> TWDTConfig {
        TWDTConfig {
            duration: core::time::Duration::from_millis(timeout_ms as u64),
            panic_on_trigger: true,
            subscribed_idle_tasks: Default::default(),
        }
    }
}

impl<'a> boltguard_core::watchdog::WatchdogPort for TaskWatchdog<'a> {
    fn feed(&mut self) -> Result<()> {
        self.subscription
            .feed()
            .map_err(|e| ControllerError::Watchdog(e.to_string()))
    }
}
