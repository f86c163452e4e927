//! Error taxonomy for everything that isn't itself an FSM transition outcome
//! or an HTTP status code. See §7 of the design doc: infrastructure failures
//! (NVS, Wi-Fi, ADC) live here; a rejected command or a failed auth check is
//! never a `ControllerError`, it's a state or a status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to read last-accepted nonce from NVS: {0}")]
    NvsRead(String),

    #[error("failed to persist nonce to NVS: {0}")]
    NvsWrite(String),

    #[error("persisted auth record was the wrong length ({0} bytes, expected 4)")]
    NvsRecordMalformed(usize),

    #[error("Wi-Fi association with \"{ssid}\" failed: {reason}")]
    WifiAssociation { ssid: String, reason: String },

    #[error("ADC read failed: {0}")]
    AdcRead(String),

    #[error("watchdog subscription failed: {0}")]
    Watchdog(String),
}

pub type Result<T> = core::result::Result<T, ControllerError>;
