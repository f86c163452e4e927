//! Motor power gating and angle commands. `MotorActuator` owns an idempotent
//! attached flag and never promises the commanded angle has been reached —
//! that's observed independently via `PositionSensor`.

/// Hardware seam for driving the servo. The ESP-IDF adapter
/// (`drivers::servo_ledc`) binds this to a `ledc` PWM channel plus the
/// switched supply line's GPIO pin; tests use `test_support::StubServo`.
pub trait ServoDriver {
    /// Energise the switched supply line and bind the PWM channel to the
    /// output pin.
    fn power_on(&mut self);

    /// De-energise the switched supply line and release the PWM channel.
    fn power_off(&mut self);

    /// Command a target angle, in degrees. Only meaningful while powered;
    /// callers are expected to call `power_on` first.
    fn write_angle(&mut self, target_deg: i32);
}

/// Attach/detach the motor's switched power line and issue target-angle
/// commands. Idempotent: repeated `attach`/`detach` calls are no-ops past
/// the first.
pub struct MotorActuator<D: ServoDriver> {
    driver: D,
    attached: bool,
}

impl<D: ServoDriver> MotorActuator<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            attached: false,
        }
    }

    /// Energise the switched supply line and bind the PWM generator to the
    /// output pin. No-op if already attached.
    pub fn attach(&mut self) {
        if !self.attached {
            self.driver.power_on();
            self.attached = true;
        }
    }

    /// Reverse `attach`: release the switched line and the PWM binding.
    /// No-op if already detached.
    pub fn detach(&mut self) {
        if self.attached {
            self.driver.power_off();
            self.attached = false;
        }
    }

    /// Attach (if needed) and command a target angle in one call. This is
    /// the entry point the FSM uses on `Unlocked`/`Locked` → `BusyMove`.
    pub fn attach_and_write(&mut self, target_deg: i32) {
        self.attach();
        self.driver.write_angle(target_deg);
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}
