//! Opaque register collaborators reached through port handlers.

/// A device exposing a single read/write register, such as a floppy
/// controller data port or an MMC interface.
///
/// Port handlers pass bytes straight through; the device decides what they
/// mean.
pub trait RegisterSink {
    fn read_register(&mut self) -> u8;
    fn write_register(&mut self, value: u8);
}

/// A device exposing a file of indexed registers, such as the AY-3-8912
/// sound chip behind the $FFFD/$BFFD pair.
pub trait RegisterBank {
    /// Read register `index`.
    fn read(&mut self, index: u8) -> u8;

    /// Write register `index`.
    fn write(&mut self, index: u8, value: u8);
}
