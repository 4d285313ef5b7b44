//! Screen timing configuration.
//!
//! A frame is a grid of lines by CPU cycles. Vertically it runs sync,
//! hidden top border, visible top border, display, bottom border, hidden
//! bottom border. Horizontally each line runs blanking, left border, display,
//! right border, hidden right border. All horizontal values are CPU cycles;
//! the beam draws two pixels per cycle.

use std::fmt;

/// Display lines the bitmap can address.
pub const MAX_DISPLAY_LINES: u16 = 192;

/// Display cycles per line the bitmap can address (256 pixels).
pub const MAX_DISPLAY_LINE_TIME: u16 = 128;

/// Raw timing inputs for one ULA variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingParams {
    pub vertical_sync_lines: u16,
    pub hidden_top_lines: u16,
    pub border_top_lines: u16,
    pub display_lines: u16,
    pub border_bottom_lines: u16,
    pub hidden_bottom_lines: u16,
    pub horizontal_blanking: u16,
    pub border_left: u16,
    pub display_line_time: u16,
    pub border_right: u16,
    pub hidden_right: u16,
    /// Cycles before its display slot that a pixel byte is fetched.
    pub pixel_prefetch: u16,
    /// Cycles before its display slot that an attribute byte is fetched.
    pub attr_prefetch: u16,
}

impl TimingParams {
    /// 48K: 224 cycles x 312 lines.
    #[must_use]
    pub const fn spectrum_48k() -> Self {
        Self {
            vertical_sync_lines: 8,
            hidden_top_lines: 8,
            border_top_lines: 48,
            display_lines: 192,
            border_bottom_lines: 48,
            hidden_bottom_lines: 8,
            horizontal_blanking: 40,
            border_left: 24,
            display_line_time: 128,
            border_right: 24,
            hidden_right: 8,
            pixel_prefetch: 2,
            attr_prefetch: 1,
        }
    }

    /// 128K, +2, +3 and Next: 228 cycles x 311 lines.
    #[must_use]
    pub const fn spectrum_128k() -> Self {
        Self {
            vertical_sync_lines: 7,
            hidden_right: 12,
            ..Self::spectrum_48k()
        }
    }
}

/// Malformed timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingError {
    NoDisplayLines,
    /// The display width must be a whole number of 8-cycle fetch groups.
    DisplayTime(u16),
    /// The display window is larger than the 256x192 bitmap.
    DisplayTooLarge { lines: u16, line_time: u16 },
    /// Attribute fetch must follow the pixel fetch, and both must lead the
    /// display by at least one cycle.
    Prefetch { pixel: u16, attr: u16 },
    /// The first prefetch would fall before the left border starts.
    PrefetchBeyondBorder { prefetch: u16, border: u16 },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDisplayLines => write!(f, "display must have at least one line"),
            Self::DisplayTime(t) => {
                write!(f, "display line time {t} is not a positive multiple of 8")
            }
            Self::DisplayTooLarge { lines, line_time } => write!(
                f,
                "display of {lines} lines x {line_time} cycles exceeds the {MAX_DISPLAY_LINES} x {MAX_DISPLAY_LINE_TIME} bitmap"
            ),
            Self::Prefetch { pixel, attr } => write!(
                f,
                "pixel prefetch {pixel} must exceed attribute prefetch {attr}, which must be at least 1"
            ),
            Self::PrefetchBeyondBorder { prefetch, border } => {
                write!(f, "prefetch of {prefetch} cycles exceeds left border of {border}")
            }
        }
    }
}

impl std::error::Error for TimingError {}

/// Validated timing with derived values cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenTiming {
    params: TimingParams,
    line_time: u32,
    first_visible_line: u32,
    first_display_line: u32,
    last_display_line: u32,
    last_visible_line: u32,
    first_pixel_tact: u32,
    frame_lines: u32,
}

impl ScreenTiming {
    pub fn new(params: TimingParams) -> Result<Self, TimingError> {
        if params.display_lines == 0 {
            return Err(TimingError::NoDisplayLines);
        }
        if params.display_line_time == 0 || params.display_line_time % 8 != 0 {
            return Err(TimingError::DisplayTime(params.display_line_time));
        }
        if params.display_lines > MAX_DISPLAY_LINES
            || params.display_line_time > MAX_DISPLAY_LINE_TIME
        {
            return Err(TimingError::DisplayTooLarge {
                lines: params.display_lines,
                line_time: params.display_line_time,
            });
        }
        if params.attr_prefetch == 0 || params.pixel_prefetch <= params.attr_prefetch {
            return Err(TimingError::Prefetch {
                pixel: params.pixel_prefetch,
                attr: params.attr_prefetch,
            });
        }
        if params.pixel_prefetch > params.border_left {
            return Err(TimingError::PrefetchBeyondBorder {
                prefetch: params.pixel_prefetch,
                border: params.border_left,
            });
        }

        let p = params;
        let line_time = u32::from(p.horizontal_blanking)
            + u32::from(p.border_left)
            + u32::from(p.display_line_time)
            + u32::from(p.border_right)
            + u32::from(p.hidden_right);
        let first_visible_line = u32::from(p.vertical_sync_lines) + u32::from(p.hidden_top_lines);
        let first_display_line = first_visible_line + u32::from(p.border_top_lines);
        let last_display_line = first_display_line + u32::from(p.display_lines) - 1;
        let last_visible_line = last_display_line + u32::from(p.border_bottom_lines);
        let frame_lines = last_visible_line + 1 + u32::from(p.hidden_bottom_lines);

        Ok(Self {
            params,
            line_time,
            first_visible_line,
            first_display_line,
            last_display_line,
            last_visible_line,
            first_pixel_tact: u32::from(p.horizontal_blanking) + u32::from(p.border_left),
            frame_lines,
        })
    }

    #[must_use]
    pub fn params(&self) -> &TimingParams {
        &self.params
    }

    /// CPU cycles per line.
    #[must_use]
    pub fn line_time(&self) -> u32 {
        self.line_time
    }

    #[must_use]
    pub fn frame_lines(&self) -> u32 {
        self.frame_lines
    }

    /// CPU cycles per frame.
    #[must_use]
    pub fn frame_tacts(&self) -> u32 {
        self.frame_lines * self.line_time
    }

    #[must_use]
    pub fn first_display_line(&self) -> u32 {
        self.first_display_line
    }

    #[must_use]
    pub fn last_display_line(&self) -> u32 {
        self.last_display_line
    }

    /// Cycle within a line at which the first display pixel is drawn.
    #[must_use]
    pub fn first_pixel_tact(&self) -> u32 {
        self.first_pixel_tact
    }

    /// Width of the visible area (border and display) in pixels.
    #[must_use]
    pub fn screen_width(&self) -> usize {
        let p = &self.params;
        2 * (usize::from(p.border_left) + usize::from(p.display_line_time) + usize::from(p.border_right))
    }

    /// Height of the visible area (border and display) in lines.
    #[must_use]
    pub fn screen_lines(&self) -> usize {
        let p = &self.params;
        usize::from(p.border_top_lines) + usize::from(p.display_lines) + usize::from(p.border_bottom_lines)
    }

    /// Frames per second at `cpu_hz`.
    #[must_use]
    pub fn refresh_rate(&self, cpu_hz: u32) -> f64 {
        f64::from(cpu_hz) / f64::from(self.frame_tacts())
    }

    /// Frames between FLASH phase flips (half the refresh rate, at least 1).
    #[must_use]
    pub fn flash_toggle_frames(&self, cpu_hz: u32) -> u32 {
        ((self.refresh_rate(cpu_hz) / 2.0).round() as u32).max(1)
    }

    /// Whether the beam is drawing (border or display) at this position.
    #[must_use]
    pub fn is_visible(&self, line: u32, tact_in_line: u32) -> bool {
        (self.first_visible_line..=self.last_visible_line).contains(&line)
            && tact_in_line >= u32::from(self.params.horizontal_blanking)
            && tact_in_line < self.line_time - u32::from(self.params.hidden_right)
    }

    #[must_use]
    pub fn is_display_line(&self, line: u32) -> bool {
        (self.first_display_line..=self.last_display_line).contains(&line)
    }

    /// Whether this position is inside the 256x192 display window.
    #[must_use]
    pub fn is_display(&self, line: u32, tact_in_line: u32) -> bool {
        self.is_display_line(line)
            && tact_in_line >= self.first_pixel_tact
            && tact_in_line < self.first_pixel_tact + u32::from(self.params.display_line_time)
    }

    /// Line index of the first visible line (sync plus hidden top border).
    #[must_use]
    pub fn first_visible_line(&self) -> u32 {
        self.first_visible_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_48k_derived_values() {
        let t = ScreenTiming::new(TimingParams::spectrum_48k()).unwrap();
        assert_eq!(t.line_time(), 224);
        assert_eq!(t.frame_lines(), 312);
        assert_eq!(t.frame_tacts(), 69_888);
        assert_eq!(t.first_display_line(), 64);
        assert_eq!(t.last_display_line(), 255);
        assert_eq!(t.first_pixel_tact(), 64);
        assert_eq!(t.screen_width(), 352);
        assert_eq!(t.screen_lines(), 288);
    }

    #[test]
    fn spectrum_128k_derived_values() {
        let t = ScreenTiming::new(TimingParams::spectrum_128k()).unwrap();
        assert_eq!(t.line_time(), 228);
        assert_eq!(t.frame_lines(), 311);
        assert_eq!(t.frame_tacts(), 70_908);
        assert_eq!(t.first_display_line(), 63);
    }

    #[test]
    fn flash_toggles_at_half_refresh_rate() {
        let t = ScreenTiming::new(TimingParams::spectrum_48k()).unwrap();
        assert_eq!(t.flash_toggle_frames(3_500_000), 25);
    }

    #[test]
    fn visibility_windows() {
        let t = ScreenTiming::new(TimingParams::spectrum_48k()).unwrap();
        assert!(!t.is_visible(15, 100), "hidden top border");
        assert!(t.is_visible(16, 40), "first visible cycle of first visible line");
        assert!(!t.is_visible(16, 39), "horizontal blanking");
        assert!(!t.is_visible(16, 216), "hidden right border");
        assert!(t.is_display(64, 64));
        assert!(!t.is_display(64, 192), "right border");
        assert!(!t.is_display(256, 64), "bottom border");
    }

    #[test]
    fn rejects_malformed_params() {
        let mut p = TimingParams::spectrum_48k();
        p.display_lines = 0;
        assert_eq!(ScreenTiming::new(p), Err(TimingError::NoDisplayLines));

        let mut p = TimingParams::spectrum_48k();
        p.display_line_time = 100;
        assert_eq!(ScreenTiming::new(p), Err(TimingError::DisplayTime(100)));

        let mut p = TimingParams::spectrum_48k();
        p.display_lines = 200;
        assert_eq!(
            ScreenTiming::new(p),
            Err(TimingError::DisplayTooLarge {
                lines: 200,
                line_time: 128
            })
        );

        let mut p = TimingParams::spectrum_48k();
        p.display_line_time = 136;
        assert!(matches!(
            ScreenTiming::new(p),
            Err(TimingError::DisplayTooLarge { line_time: 136, .. })
        ));

        let mut p = TimingParams::spectrum_48k();
        p.attr_prefetch = 2;
        assert!(matches!(ScreenTiming::new(p), Err(TimingError::Prefetch { .. })));

        let mut p = TimingParams::spectrum_48k();
        p.border_left = 1;
        assert_eq!(
            ScreenTiming::new(p),
            Err(TimingError::PrefetchBeyondBorder {
                prefetch: 2,
                border: 1
            })
        );
    }
}
