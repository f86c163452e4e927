//! Board configuration: Wi-Fi credentials, the shared HMAC secret, and the
//! timing constants that only the firmware's bring-up and main loop need.
//! The tolerance/timeout constants the core logic is built around live in
//! `boltguard_core::config` instead.
//!
//! Credentials come from `cfg.toml` (gitignored; copy `cfg.toml.example`)
//! via `toml-cfg`, rather than being baked in as string literals, so the
//! source tree never carries a real secret. `toml-cfg` resolves the table
//! to read by this crate's package name, so `cfg.toml` must carry a
//! `[boltguard-firmware]` table.

#[toml_cfg::toml_config]
pub struct BoardConfig {
    #[default("")]
    wifi_ssid: &'static str,
    #[default("")]
    wifi_psk: &'static str,
    #[default("")]
    remote_lock_pass: &'static str,
}

/// Target control loop period. Each tick is bounded well under the hardware
/// watchdog timeout below.
pub const TICK_INTERVAL_MS: u32 = 100;

/// Hardware task watchdog timeout. A tick that runs long enough to blow
/// through this forces a reset; see the error-handling design notes.
pub const WATCHDOG_TIMEOUT_MS: u32 = 2_700;

/// Settle time after commanding the motor to an endpoint during calibration,
/// before sampling the powered-feedback anchor.
pub const CALIBRATION_SETTLE_POWERED_MS: u32 = 2_000;

/// Settle time after releasing motor power during calibration, before
/// sampling the unpowered-feedback anchor.
pub const CALIBRATION_SETTLE_UNPOWERED_MS: u32 = 500;

/// Mechanical travel endpoints the bringup calibration routine drives the
/// motor to, in degrees. These bound the full range `PositionSensor`'s
/// linear map is built over; the narrower `lock_deg`/`unlock_deg` pair is
/// learned afterwards by the button-press calibration in the FSM.
pub const CALIBRATION_MIN_POS_DEG: i32 = 0;
pub const CALIBRATION_MAX_POS_DEG: i32 = 180;

pub fn wifi_ssid() -> &'static str {
    BOARD_CONFIG.wifi_ssid
}

pub fn wifi_psk() -> &'static str {
    BOARD_CONFIG.wifi_psk
}

/// The shared secret `AuthVerifier` keys its HMAC with.
pub fn remote_lock_pass() -> &'static str {
    BOARD_CONFIG.remote_lock_pass
}
