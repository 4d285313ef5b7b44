//! Host input read by the port handlers: keyboard, Kempston joystick and the
//! tape EAR line.
//!
//! The keyboard is an 8x5 matrix. Reading port $FE with a cleared bit in
//! address lines A8-A15 scans the matching half-row; pressed keys read as 0.

/// A key on the 40-key matrix.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    CapsShift, Z, X, C, V,
    A, S, D, F, G,
    Q, W, E, R, T,
    Num1, Num2, Num3, Num4, Num5,
    Num0, Num9, Num8, Num7, Num6,
    P, O, I, U, Y,
    Enter, L, K, J, H,
    Space, SymbolShift, M, N, B,
}

impl Key {
    /// Half-row (A8 = 0 ... A15 = 7) and data bit.
    #[must_use]
    pub fn matrix_position(self) -> (usize, u8) {
        let index = self as usize;
        (index / 5, (index % 5) as u8)
    }
}

/// Kempston joystick directions and fire, as read on port $1F (active high).
pub mod kempston {
    pub const RIGHT: u8 = 0x01;
    pub const LEFT: u8 = 0x02;
    pub const DOWN: u8 = 0x04;
    pub const UP: u8 = 0x08;
    pub const FIRE: u8 = 0x10;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    /// Pressed keys per half-row, bit set = pressed.
    rows: [u8; 8],
    kempston: u8,
    ear: Option<bool>,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        let (row, bit) = key.matrix_position();
        if pressed {
            self.rows[row] |= 1 << bit;
        } else {
            self.rows[row] &= !(1 << bit);
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    /// Keyboard bits 0-4 for a port $FE read with high address byte
    /// `addr_high`: a bit is 0 if its key is down in any selected half-row.
    #[must_use]
    pub fn scan_keyboard(&self, addr_high: u8) -> u8 {
        let pressed = self
            .rows
            .iter()
            .enumerate()
            .filter(|(row, _)| addr_high & (1 << row) == 0)
            .fold(0, |acc, (_, keys)| acc | keys);
        !pressed & 0x1F
    }

    /// Set the joystick state from `kempston` bits.
    pub fn set_kempston(&mut self, state: u8) {
        self.kempston = state & 0x1F;
    }

    #[must_use]
    pub fn kempston(&self) -> u8 {
        self.kempston
    }

    /// Drive the EAR input from a tape signal, or `None` when no tape is
    /// playing.
    pub fn set_ear(&mut self, level: Option<bool>) {
        self.ear = level;
    }

    #[must_use]
    pub fn ear(&self) -> Option<bool> {
        self.ear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_keyboard_reads_high() {
        assert_eq!(InputState::new().scan_keyboard(0x00), 0x1F);
    }

    #[test]
    fn key_visible_only_in_its_half_row() {
        let mut input = InputState::new();
        input.set_key(Key::A, true);
        assert_eq!(input.scan_keyboard(0xFD), 0x1E);
        assert_eq!(input.scan_keyboard(0xFE), 0x1F);
        input.set_key(Key::A, false);
        assert_eq!(input.scan_keyboard(0xFD), 0x1F);
    }

    #[test]
    fn selected_rows_are_combined() {
        let mut input = InputState::new();
        input.set_key(Key::CapsShift, true);
        input.set_key(Key::Num9, true);
        assert_eq!(input.scan_keyboard(0xEE), 0x1C);
    }

    #[test]
    fn matrix_positions() {
        assert_eq!(Key::CapsShift.matrix_position(), (0, 0));
        assert_eq!(Key::Num6.matrix_position(), (4, 4));
        assert_eq!(Key::B.matrix_position(), (7, 4));
    }
}
