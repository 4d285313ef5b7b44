//! Plain latches: a write stores the byte, a read returns it or a fixed value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatchPort {
    value: u8,
    power_on: u8,
    fixed_read: Option<u8>,
}

impl LatchPort {
    /// A latch that reads back what was last written.
    #[must_use]
    pub fn new(power_on: u8) -> Self {
        Self {
            value: power_on,
            power_on,
            fixed_read: None,
        }
    }

    /// A latch whose reads always return `value`.
    #[must_use]
    pub fn reading(power_on: u8, value: u8) -> Self {
        Self {
            fixed_read: Some(value),
            ..Self::new(power_on)
        }
    }

    /// The last byte written.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.value
    }

    pub(super) fn read(&self) -> u8 {
        self.fixed_read.unwrap_or(self.value)
    }

    pub(super) fn write(&mut self, value: u8) {
        self.value = value;
    }

    pub(super) fn reset(&mut self) {
        self.value = self.power_on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_last_write() {
        let mut latch = LatchPort::new(0);
        latch.write(0x3C);
        assert_eq!(latch.read(), 0x3C);
        latch.reset();
        assert_eq!(latch.read(), 0);
    }

    #[test]
    fn fixed_read_ignores_writes() {
        let mut latch = LatchPort::reading(0, 0xFF);
        latch.write(0x12);
        assert_eq!(latch.read(), 0xFF);
        assert_eq!(latch.value(), 0x12);
    }
}
