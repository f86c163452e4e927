//! Binds `position_sensor::AnalogInput` to the feedback potentiometer's ADC
//! channel.

use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::Gpio34;

use boltguard_core::position_sensor::AnalogInput;

pub struct PositionAdc<'a> {
    channel: AdcChannelDriver<'a, Gpio34, AdcDriver<'a, ADC1>>,
}

impl<'a> PositionAdc<'a> {
    pub fn new(channel: AdcChannelDriver<'a, Gpio34, AdcDriver<'a, ADC1>>) -> Self {
        Self { channel }
    }
}

impl<'a> AnalogInput for PositionAdc<'a> {
    fn read_raw(&mut self) -> u16 {
        // A transient read failure here (eg a busy ADC controller) is rare
        // enough on this board that we fall back to the last safe midpoint
        // rather than propagate a `Result` through the sampling hot path;
        // the median-of-five filter in `PositionSensor` absorbs an
        // occasional bad sample.
        self.channel.read().unwrap_or(2048)
    }
}
