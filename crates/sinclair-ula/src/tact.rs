//! Per-cycle ULA activity table.
//!
//! One entry per CPU cycle of the frame says what the beam does on that
//! cycle: nothing, border, or one of the display sub-phases, together with
//! the display-memory address the ULA fetches and the contention delay a CPU
//! access to contended memory would suffer.
//!
//! # Fetch pipeline
//!
//! Display cycles come in groups of 8 (16 pixels, two bitmap bytes). While
//! byte 1 is on screen the ULA fetches byte 2 and its attribute; while byte 2
//! is on screen it fetches byte 1 of the next group. The first group of each
//! line is primed from the left border, `pixel_prefetch` and `attr_prefetch`
//! cycles before the display starts.
//!
//! | Offset in group | Phase | Fetch | Delay |
//! |---|---|---|---|
//! | 0, 1 | byte 1 | | 4, 3 |
//! | 2 | byte 1 | bitmap +2 | 2 |
//! | 3 | byte 1 | attribute +1 | 1 |
//! | 4, 5 | byte 2 | | 0, 0 |
//! | 6 | byte 2 | bitmap +2 | 6 |
//! | 7 | byte 2 | attribute +1 | 5 |
//!
//! The last group of a line has nothing further to fetch, so offsets 6 and 7
//! degrade to plain byte 2 display with no delay.

use std::rc::Rc;

use crate::timing::{ScreenTiming, TimingError, TimingParams};

/// What the beam does during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingPhase {
    /// Blanking, sync or hidden border.
    #[default]
    Idle,
    Border,
    BorderFetchPixel,
    BorderFetchAttr,
    DisplayByte1,
    DisplayByte1FetchByte2,
    DisplayByte1FetchAttr2,
    DisplayByte2,
    DisplayByte2FetchByte1,
    DisplayByte2FetchAttr1,
}

impl RenderingPhase {
    /// Whether the ULA reads a bitmap byte on this cycle.
    #[must_use]
    pub fn fetches_pixel(self) -> bool {
        matches!(
            self,
            Self::BorderFetchPixel | Self::DisplayByte1FetchByte2 | Self::DisplayByte2FetchByte1
        )
    }

    /// Whether the ULA reads an attribute byte on this cycle.
    #[must_use]
    pub fn fetches_attr(self) -> bool {
        matches!(
            self,
            Self::BorderFetchAttr | Self::DisplayByte1FetchAttr2 | Self::DisplayByte2FetchAttr1
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Border => "border",
            Self::BorderFetchPixel => "border-fetch-pixel",
            Self::BorderFetchAttr => "border-fetch-attr",
            Self::DisplayByte1 => "display-byte1",
            Self::DisplayByte1FetchByte2 => "display-byte1-fetch-byte2",
            Self::DisplayByte1FetchAttr2 => "display-byte1-fetch-attr2",
            Self::DisplayByte2 => "display-byte2",
            Self::DisplayByte2FetchByte1 => "display-byte2-fetch-byte1",
            Self::DisplayByte2FetchAttr1 => "display-byte2-fetch-attr1",
        }
    }
}

/// One cycle of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderingTact {
    pub phase: RenderingPhase,
    /// Leftmost of the two pixels drawn this cycle, in visible-area coordinates.
    pub x: u16,
    pub y: u16,
    /// Bitmap or attribute address read on fetch phases, otherwise 0.
    pub fetch_address: u16,
    /// Cycles a contended CPU access on this cycle is delayed.
    pub contention: u8,
}

/// The activity of every cycle in a frame, built once per timing.
///
/// Immutable after construction; the renderer, the machine and the floating
/// bus share one instance through an `Rc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TactTable {
    timing: ScreenTiming,
    tacts: Vec<RenderingTact>,
}

impl TactTable {
    /// Validate `params` and build the table.
    pub fn from_params(params: TimingParams) -> Result<Rc<Self>, TimingError> {
        Ok(Rc::new(Self::build(&ScreenTiming::new(params)?)))
    }

    #[must_use]
    pub fn build(timing: &ScreenTiming) -> Self {
        let line_time = timing.line_time();
        let tacts = (0..timing.frame_tacts())
            .map(|tact| classify(timing, tact / line_time, tact % line_time))
            .collect::<Vec<_>>();
        log::debug!(
            "tact table: {} cycles, {} lines of {}",
            tacts.len(),
            timing.frame_lines(),
            line_time
        );
        Self {
            timing: *timing,
            tacts,
        }
    }

    #[must_use]
    pub fn timing(&self) -> &ScreenTiming {
        &self.timing
    }

    /// Cycles per frame.
    #[must_use]
    pub fn frame_tacts(&self) -> u32 {
        self.tacts.len() as u32
    }

    /// The entry for `tact`, reduced modulo the frame length.
    #[must_use]
    pub fn get(&self, tact: u32) -> &RenderingTact {
        &self.tacts[(tact % self.frame_tacts()) as usize]
    }

    /// Contention delay at `tact`, reduced modulo the frame length.
    #[must_use]
    pub fn contention(&self, tact: u32) -> u8 {
        self.get(tact).contention
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderingTact> {
        self.tacts.iter()
    }
}

fn classify(timing: &ScreenTiming, line: u32, tact_in_line: u32) -> RenderingTact {
    if !timing.is_visible(line, tact_in_line) {
        return RenderingTact::default();
    }

    let p = timing.params();
    let mut entry = RenderingTact {
        phase: RenderingPhase::Border,
        x: ((tact_in_line - u32::from(p.horizontal_blanking)) * 2) as u16,
        y: (line - timing.first_visible_line()) as u16,
        ..RenderingTact::default()
    };
    if !timing.is_display_line(line) {
        return entry;
    }

    let first = timing.first_pixel_tact();
    let pixel_lead = u32::from(p.pixel_prefetch);
    let attr_lead = u32::from(p.attr_prefetch);

    if !timing.is_display(line, tact_in_line) {
        if tact_in_line + pixel_lead == first {
            entry.phase = RenderingPhase::BorderFetchPixel;
            entry.fetch_address = pixel_address(timing, line, first);
            entry.contention = 6;
        } else if tact_in_line + attr_lead == first {
            entry.phase = RenderingPhase::BorderFetchAttr;
            entry.fetch_address = attr_address(timing, line, first);
            entry.contention = 5;
        }
        return entry;
    }

    let end = first + u32::from(p.display_line_time);
    let (phase, fetch_address, contention) = match (tact_in_line - first) & 7 {
        0 => (RenderingPhase::DisplayByte1, 0, 4),
        1 => (RenderingPhase::DisplayByte1, 0, 3),
        2 => (
            RenderingPhase::DisplayByte1FetchByte2,
            pixel_address(timing, line, tact_in_line + pixel_lead),
            2,
        ),
        3 => (
            RenderingPhase::DisplayByte1FetchAttr2,
            attr_address(timing, line, tact_in_line + attr_lead),
            1,
        ),
        6 if tact_in_line + pixel_lead < end => (
            RenderingPhase::DisplayByte2FetchByte1,
            pixel_address(timing, line, tact_in_line + pixel_lead),
            6,
        ),
        7 if tact_in_line + attr_lead < end => (
            RenderingPhase::DisplayByte2FetchAttr1,
            attr_address(timing, line, tact_in_line + attr_lead),
            5,
        ),
        _ => (RenderingPhase::DisplayByte2, 0, 0),
    };
    entry.phase = phase;
    entry.fetch_address = fetch_address;
    entry.contention = contention;
    entry
}

/// Bitmap address of the byte displayed at `tact_in_line` on `line`.
///
/// Lays row and column out linearly, then swaps the pixel-row and
/// character-row bit fields: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`.
fn pixel_address(timing: &ScreenTiming, line: u32, tact_in_line: u32) -> u16 {
    let row = line - timing.first_display_line();
    let col = 2 * (tact_in_line - timing.first_pixel_tact());
    let linear = 0x4000 | (col >> 3) | (row << 5);
    ((linear & 0xF81F) | ((linear & 0x0700) >> 3) | ((linear & 0x00E0) << 3)) as u16
}

/// Attribute address of the byte displayed at `tact_in_line` on `line`.
fn attr_address(timing: &ScreenTiming, line: u32, tact_in_line: u32) -> u16 {
    let row = line - timing.first_display_line();
    let col = 2 * (tact_in_line - timing.first_pixel_tact());
    (0x5800 + ((col >> 3) | ((row >> 3) << 5))) as u16
}
