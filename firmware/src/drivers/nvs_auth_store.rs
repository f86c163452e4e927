//! Binds `auth::PersistentNonceStore` to a dedicated NVS namespace. The
//! slot is a single 4-byte little-endian `u32` under a fixed key, matching
//! §6's "one slot... at a fixed address in non-volatile storage".

use esp_idf_svc::nvs::{EspNvs, NvsDefault};

use boltguard_core::auth::PersistentNonceStore;
use boltguard_core::error::{ControllerError, Result};

pub const NAMESPACE: &str = "boltguard";
const KEY_LAST_NONCE: &str = "last_nonce";

pub struct NvsAuthStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsAuthStore {
    pub fn new(nvs: EspNvs<NvsDefault>) -> Self {
        Self { nvs }
    }

    /// Wipe the slot. Only called at boot under the `reset_timestamp`
    /// feature, to recover a device whose replay window has wedged against
    /// a client with a broken clock.
    pub fn reset(&mut self) -> Result<()> {
        self.nvs
            .remove(KEY_LAST_NONCE)
            .map(|_| ())
            .map_err(|e| ControllerError::NvsWrite(e.to_string()))
    }
}

impl PersistentNonceStore for NvsAuthStore {
    fn load_last_nonce(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        match self
            .nvs
            .get_raw(KEY_LAST_NONCE, &mut buf)
            .map_err(|e| ControllerError::NvsRead(e.to_string()))?
        {
            Some(slice) => {
                if slice.len() != 4 {
                    return Err(ControllerError::NvsRecordMalformed(slice.len()));
                }
                Ok(u32::from_le_bytes(buf))
            }
            // No record yet: a brand-new device has never accepted a
            // nonce, so the last-accepted value is 0.
            None => Ok(0),
        }
    }

    fn store_last_nonce(&mut self, nonce: u32) -> Result<()> {
        self.nvs
            .set_raw(KEY_LAST_NONCE, &nonce.to_le_bytes())
            .map_err(|e| ControllerError::NvsWrite(e.to_string()))
    }
}
