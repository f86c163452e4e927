//! Entry point: board bring-up (Wi-Fi, NVS, peripherals), then the ~10 Hz
//! control loop described in §4.6. Everything here is wiring — the actual
//! control-plane logic lives in `fsm`, `auth`, and `protocols::http`, none
//! of which know this binary is running on an ESP32.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::gpio::{InterruptType, PinDriver as GpioPinDriver};
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_svc::hal::task::watchdog::TWDTDriver;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;

use boltguard_core::auth::AuthVerifier;
use boltguard_core::control_loop::ControlLoop;
use boltguard_core::display::DisplayMirror;
use boltguard_core::motor_actuator::MotorActuator;
use boltguard_core::position_sensor::{self, DelaySource, PositionSensor};

mod config;
mod drivers;

use crate::drivers::max7219_display::Max7219Display;
use crate::drivers::nvs_auth_store::NvsAuthStore;
use crate::drivers::position_adc::PositionAdc;
use crate::drivers::servo_ledc::ServoLedc;
use crate::drivers::task_watchdog::TaskWatchdog;
use crate::drivers::tcp_listener::HttpListener;

const HTTP_PORT: u16 = 80;

/// Binds `position_sensor::DelaySource` to `std::thread::sleep` for the
/// bringup calibration routine's settle delays.
struct ThreadSleep;

impl DelaySource for ThreadSleep {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sys_loop = EspSystemEventLoop::take().context("failed to take system event loop")?;
    let nvs_partition = EspDefaultNvsPartition::take().context("failed to take NVS partition")?;

    let mut wifi = connect_wifi(peripherals.modem, sys_loop, nvs_partition.clone())
        .context("Wi-Fi association failed")?;
    info!("Wi-Fi connected as {:?}", wifi.wifi().sta_netif().get_ip_info());

    let mut nvs = EspNvs::new(nvs_partition, drivers::nvs_auth_store::NAMESPACE, true)
        .context("failed to open NVS namespace")?;
    let mut auth_store = NvsAuthStore::new(nvs);
    if cfg!(feature = "reset_timestamp") {
        auth_store.reset().context("failed to reset auth slot")?;
    }
    let auth = AuthVerifier::new(auth_store, config::remote_lock_pass());

    let adc = AdcDriver::new(peripherals.adc1)?;
    let adc_channel =
        AdcChannelDriver::new(adc, peripherals.pins.gpio34, &AdcChannelConfig::new())?;
    let mut position_adc = PositionAdc::new(adc_channel);

    let timer = LedcTimerDriver::new(peripherals.ledc.timer0, &TimerConfig::new().frequency(50.Hz()))?;
    let pwm = LedcDriver::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio18)?;
    let supply_switch = GpioPinDriver::output(peripherals.pins.gpio19)?;
    let mut actuator = MotorActuator::new(ServoLedc::new(pwm, supply_switch));

    info!("running bringup position calibration");
    let tables = position_sensor::calibrate(
        &mut position_adc,
        &mut actuator,
        &mut ThreadSleep,
        config::CALIBRATION_MIN_POS_DEG,
        config::CALIBRATION_MAX_POS_DEG,
        config::CALIBRATION_SETTLE_POWERED_MS,
        config::CALIBRATION_SETTLE_UNPOWERED_MS,
    );
    let position = PositionSensor::new(position_adc, tables);

    let spi_driver = SpiDriver::new(
        peripherals.spi2,
        peripherals.pins.gpio14,
        peripherals.pins.gpio13,
        None::<esp_idf_svc::hal::gpio::AnyIOPin>,
        &SpiDriverConfig::new(),
    )?;
    let spi_device =
        SpiDeviceDriver::new(spi_driver, Some(peripherals.pins.gpio15), &Default::default())?;
    let display = DisplayMirror::new(Max7219Display::new(spi_device));

    let mut calibrate_btn =
        GpioPinDriver::input(peripherals.pins.gpio4)?;
    calibrate_btn.set_interrupt_type(InterruptType::PosEdge)?;
    unsafe {
        calibrate_btn.subscribe(|| boltguard_core::calibration_flag::on_calibration_edge())?;
    }
    calibrate_btn.enable_interrupt()?;

    let twdt_config = TaskWatchdog::config(config::WATCHDOG_TIMEOUT_MS);
    let twdt_driver = TWDTDriver::new(peripherals.twdt, &twdt_config)?;
    let watchdog = TaskWatchdog::new(&twdt_driver)?;

    let mut listener = HttpListener::bind(HTTP_PORT).context("failed to bind HTTP listener")?;

    let mut control_loop = ControlLoop::new(
        position,
        actuator,
        auth,
        display,
        watchdog,
        cfg!(feature = "skip_auth"),
    );

    let boot = Instant::now();
    let tick_period = Duration::from_millis(config::TICK_INTERVAL_MS as u64);

    loop {
        let tick_start = Instant::now();
        let now_ms = boot.elapsed().as_millis() as u64;

        if let Err(e) = control_loop.tick(&mut listener, now_ms) {
            log::error!("control loop tick failed: {e}");
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_period {
            thread::sleep(tick_period - elapsed);
        }
    }
}

fn connect_wifi(
    modem: esp_idf_svc::hal::modem::Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
) -> Result<BlockingWifi<EspWifi<'static>>> {
    let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config::wifi_ssid()
            .try_into()
            .context("SSID too long for configuration struct")?,
        password: config::wifi_psk()
            .try_into()
            .context("PSK too long for configuration struct")?,
        ..Default::default()
    }))?;

    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;

    Ok(wifi)
}
