//! Devices outside the bus that port handlers forward to.
//!
//! None of them are emulated here. A host plugs in whatever it has; a port
//! whose device is absent reads $FF and drops writes.

use emu_core::{RegisterBank, RegisterSink};
use serde::{Deserialize, Serialize};

/// Single-register devices reached through pass-through port handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageRegister {
    /// +3 FDC main status register ($2FFD).
    FloppyStatus,
    /// +3 FDC data register ($3FFD).
    FloppyData,
    /// DivIDE control ($E3).
    DivIdeControl,
    /// MMC chip select ($E7).
    MmcControl,
    /// MMC SPI data ($EB).
    MmcData,
}

impl StorageRegister {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

/// Plugged-in peripherals.
#[derive(Default)]
pub struct Peripherals {
    sound: Option<Box<dyn RegisterBank>>,
    storage: [Option<Box<dyn RegisterSink>>; StorageRegister::COUNT],
    disk_motor: bool,
    printer_strobe: bool,
}

impl Peripherals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the AY sound chip behind $FFFD/$BFFD.
    pub fn attach_sound(&mut self, chip: Box<dyn RegisterBank>) {
        self.sound = Some(chip);
    }

    pub fn attach_storage(&mut self, register: StorageRegister, device: Box<dyn RegisterSink>) {
        self.storage[register.index()] = Some(device);
    }

    pub(crate) fn sound_read(&mut self, index: u8) -> u8 {
        self.sound.as_mut().map_or(0xFF, |chip| chip.read(index))
    }

    pub(crate) fn sound_write(&mut self, index: u8, value: u8) {
        if let Some(chip) = self.sound.as_mut() {
            chip.write(index, value);
        }
    }

    pub(crate) fn storage_read(&mut self, register: StorageRegister) -> u8 {
        self.storage[register.index()]
            .as_mut()
            .map_or(0xFF, |device| device.read_register())
    }

    pub(crate) fn storage_write(&mut self, register: StorageRegister, value: u8) {
        if let Some(device) = self.storage[register.index()].as_mut() {
            device.write_register(value);
        }
    }

    /// +3 disk motor line, from $1FFD bit 3.
    #[must_use]
    pub fn disk_motor(&self) -> bool {
        self.disk_motor
    }

    pub(crate) fn set_disk_motor(&mut self, on: bool) {
        if on != self.disk_motor {
            log::trace!("disk motor {}", if on { "on" } else { "off" });
        }
        self.disk_motor = on;
    }

    /// +3 printer strobe line, from $1FFD bit 4.
    #[must_use]
    pub fn printer_strobe(&self) -> bool {
        self.printer_strobe
    }

    pub(crate) fn set_printer_strobe(&mut self, on: bool) {
        self.printer_strobe = on;
    }

    pub(crate) fn reset_lines(&mut self) {
        self.disk_motor = false;
        self.printer_strobe = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<u8>>>);

    impl RegisterSink for Recorder {
        fn read_register(&mut self) -> u8 {
            0x80
        }

        fn write_register(&mut self, value: u8) {
            self.0.borrow_mut().push(value);
        }
    }

    #[test]
    fn absent_devices_read_ff() {
        let mut p = Peripherals::new();
        assert_eq!(p.sound_read(7), 0xFF);
        assert_eq!(p.storage_read(StorageRegister::MmcData), 0xFF);
        p.storage_write(StorageRegister::MmcData, 1);
    }

    #[test]
    fn storage_passes_through() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut p = Peripherals::new();
        p.attach_storage(StorageRegister::FloppyData, Box::new(Recorder(Rc::clone(&log))));
        p.storage_write(StorageRegister::FloppyData, 0x46);
        assert_eq!(p.storage_read(StorageRegister::FloppyData), 0x80);
        assert_eq!(p.storage_read(StorageRegister::FloppyStatus), 0xFF);
        assert_eq!(*log.borrow(), [0x46]);
    }
}
