//! Binds `motor_actuator::ServoDriver` to an LEDC PWM channel for the servo
//! pulse train plus a plain GPIO pin for the switched supply line.

use embedded_hal::digital::OutputPin;
use esp_idf_hal::ledc::LedcDriver;

use boltguard_core::motor_actuator::ServoDriver;

/// Pulse width range a hobby servo expects, in microseconds, for 0..180
/// degrees of travel.
const PULSE_MIN_US: u32 = 1_000;
const PULSE_MAX_US: u32 = 2_000;
const SERVO_TRAVEL_DEG: u32 = 180;

pub struct ServoLedc<'a, P: OutputPin> {
    pwm: LedcDriver<'a>,
    supply_switch: P,
}

impl<'a, P: OutputPin> ServoLedc<'a, P> {
    pub fn new(pwm: LedcDriver<'a>, supply_switch: P) -> Self {
        Self { pwm, supply_switch }
    }

    fn pulse_us_for(target_deg: i32) -> u32 {
        let clamped = target_deg.clamp(0, SERVO_TRAVEL_DEG as i32) as u32;
        PULSE_MIN_US + (clamped * (PULSE_MAX_US - PULSE_MIN_US)) / SERVO_TRAVEL_DEG
    }
}

impl<'a, P: OutputPin> ServoDriver for ServoLedc<'a, P> {
    fn power_on(&mut self) {
        if let Err(e) = self.supply_switch.set_high() {
            log::warn!("failed to energise motor supply line: {e:?}");
        }
    }

    fn power_off(&mut self) {
        if let Err(e) = self.pwm.disable() {
            log::warn!("failed to disable PWM channel on detach: {e:?}");
        }
        if let Err(e) = self.supply_switch.set_low() {
            log::warn!("failed to de-energise motor supply line: {e:?}");
        }
    }

    fn write_angle(&mut self, target_deg: i32) {
        let pulse_us = Self::pulse_us_for(target_deg);
        let max_duty = self.pwm.get_max_duty();
        let period_us = 20_000u32; // Standard 50 Hz servo refresh.
        let duty = ((pulse_us as u64 * max_duty as u64) / period_us as u64) as u32;

        if let Err(e) = self.pwm.enable() {
            log::warn!("failed to enable PWM channel: {e:?}");
        }
        if let Err(e) = self.pwm.set_duty(duty) {
            log::warn!("failed to set servo duty cycle: {e:?}");
        }
    }
}
