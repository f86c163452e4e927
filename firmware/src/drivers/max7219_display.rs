//! Binds `display::DisplayPort` to a MAX7219 dot-matrix module over SPI.
//! Glyph rendering (the actual 8x8 bitmaps per state) is a UI concern
//! outside the core's contract; this adapter only needs to push the right
//! 8-byte frame per state, which a `max7219`-style crate's `write_raw`
//! already takes care of.

use embedded_hal::spi::SpiDevice;

use boltguard_core::display::DisplayPort;
use boltguard_core::fsm::LockState;

/// One 8x8 glyph per state, indexed by row. Exact bit patterns are a
/// cosmetic choice; the mapping itself — one frame per state, updated only
/// on change — is the part the core specifies.
fn glyph_for(state: LockState) -> [u8; 8] {
    match state {
        LockState::CalibrateLock => [0x3C, 0x42, 0x81, 0x81, 0x81, 0x81, 0x42, 0x3C],
        LockState::CalibrateUnlock => [0x3C, 0x42, 0x81, 0x81, 0x99, 0x81, 0x42, 0x3C],
        LockState::Unlocked => [0x18, 0x24, 0x24, 0x24, 0x7E, 0x7E, 0x7E, 0x7E],
        LockState::Locked => [0x18, 0x24, 0x24, 0x3C, 0x7E, 0x7E, 0x7E, 0x7E],
        LockState::BusyWait => [0x3C, 0x42, 0x99, 0xA5, 0xA5, 0x99, 0x42, 0x3C],
        LockState::BusyMove => [0x00, 0x18, 0x3C, 0x7E, 0x7E, 0x3C, 0x18, 0x00],
        LockState::Bad => [0xFF, 0x81, 0xBD, 0xA5, 0xA5, 0xBD, 0x81, 0xFF],
    }
}

pub struct Max7219Display<SPI: SpiDevice> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max7219Display<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    fn write_raw(&mut self, rows: &[u8; 8]) {
        for (row_idx, row) in rows.iter().enumerate() {
            let frame = [(row_idx as u8 + 1), *row];
            if let Err(e) = self.spi.write(&frame) {
                log::warn!("display SPI write failed: {e:?}");
                return;
            }
        }
    }
}

impl<SPI: SpiDevice> DisplayPort for Max7219Display<SPI> {
    fn show(&mut self, state: LockState) {
        self.write_raw(&glyph_for(state));
    }
}
