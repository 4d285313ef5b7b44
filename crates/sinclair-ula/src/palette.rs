//! ZX Spectrum 16-colour palette.
//!
//! Three colour bits plus BRIGHT. Normal colours drive the guns at 0xD7,
//! bright ones at full 0xFF; black is black either way.

/// ARGB32 palette indexed by `bright << 3 | colour`.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000,
    0xFF00_00D7,
    0xFFD7_0000,
    0xFFD7_00D7,
    0xFF00_D700,
    0xFF00_D7D7,
    0xFFD7_D700,
    0xFFD7_D7D7,
    0xFF00_0000,
    0xFF00_00FF,
    0xFFFF_0000,
    0xFFFF_00FF,
    0xFF00_FF00,
    0xFF00_FFFF,
    0xFFFF_FF00,
    0xFFFF_FFFF,
];

/// Ink and paper palette indices for an attribute byte.
///
/// `flash_on` swaps the two when the attribute has FLASH (bit 7) set.
#[must_use]
pub fn attr_colours(attr: u8, flash_on: bool) -> (u8, u8) {
    let bright = (attr & 0x40) >> 3;
    let ink = (attr & 0x07) | bright;
    let paper = ((attr & 0x38) >> 3) | bright;
    if flash_on && attr & 0x80 != 0 {
        (paper, ink)
    } else {
        (ink, paper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bright_selects_upper_half() {
        assert_eq!(attr_colours(0x47, false), (15, 8));
        assert_eq!(attr_colours(0x07, false), (7, 0));
    }

    #[test]
    fn flash_swaps_only_when_phase_is_on() {
        assert_eq!(attr_colours(0x8A, false), (2, 1));
        assert_eq!(attr_colours(0x8A, true), (1, 2));
        assert_eq!(attr_colours(0x0A, true), (2, 1), "no FLASH bit, no swap");
    }
}
