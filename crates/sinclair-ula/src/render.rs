//! Frame renderer driven by the tact table.

use std::rc::Rc;

use crate::palette::{PALETTE, attr_colours};
use crate::tact::{RenderingPhase, TactTable};

/// Receives finished frames.
pub trait FrameSink {
    /// A new frame is about to be drawn.
    fn start_new_frame(&mut self) {}

    /// A frame is complete. `pixels` holds one palette index per pixel,
    /// row-major, `width` pixels per row.
    fn display_frame(&mut self, pixels: &[u8], width: usize);
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn display_frame(&mut self, _pixels: &[u8], _width: usize) {}
}

/// Renderer runtime state that survives a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenState {
    pub border: u8,
    pub flash_on: bool,
    pub frame_count: u32,
    pub overflow: u32,
    pub pixel_byte1: u8,
    pub pixel_byte2: u8,
    pub attr_byte1: u8,
    pub attr_byte2: u8,
    pub frame_complete: bool,
    pub pixels: Vec<u8>,
}

/// Walks the tact table, fetching display bytes through a caller-supplied
/// closure and writing palette indices into the pixel buffer.
pub struct ScreenRenderer {
    tacts: Rc<TactTable>,
    width: usize,
    pixels: Vec<u8>,
    border: u8,
    flash_on: bool,
    flash_toggle_frames: u32,
    frame_count: u32,
    overflow: u32,
    pixel_byte1: u8,
    pixel_byte2: u8,
    attr_byte1: u8,
    attr_byte2: u8,
    frame_complete: bool,
    sink: Box<dyn FrameSink>,
}

impl ScreenRenderer {
    /// A renderer for `tacts` whose FLASH rate derives from `cpu_hz`.
    #[must_use]
    pub fn new(tacts: Rc<TactTable>, cpu_hz: u32) -> Self {
        let timing = *tacts.timing();
        let width = timing.screen_width();
        Self {
            width,
            pixels: vec![0; width * timing.screen_lines()],
            border: 7,
            flash_on: false,
            flash_toggle_frames: timing.flash_toggle_frames(cpu_hz),
            frame_count: 0,
            overflow: 0,
            pixel_byte1: 0,
            pixel_byte2: 0,
            attr_byte1: 0,
            attr_byte2: 0,
            frame_complete: false,
            sink: Box::new(NullSink),
            tacts,
        }
    }

    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = sink;
    }

    #[must_use]
    pub fn tact_table(&self) -> &Rc<TactTable> {
        &self.tacts
    }

    /// Render cycles `from..=to` of the frame.
    ///
    /// Both ends are reduced modulo the frame length first; if `from` then
    /// lies after `to` nothing is drawn. `fetch` reads display memory and is
    /// called once per fetch phase.
    pub fn render_range(&mut self, from: u32, to: u32, mut fetch: impl FnMut(u16) -> u8) {
        let tacts = Rc::clone(&self.tacts);
        let frame = tacts.frame_tacts();
        let (from, to) = (from % frame, to % frame);
        if from > to {
            return;
        }

        for tact in from..=to {
            let t = tacts.get(tact);
            let (x, y) = (usize::from(t.x), usize::from(t.y));
            match t.phase {
                RenderingPhase::Idle => {}
                RenderingPhase::Border => self.border_pair(x, y),
                RenderingPhase::BorderFetchPixel => {
                    self.border_pair(x, y);
                    self.pixel_byte1 = fetch(t.fetch_address);
                }
                RenderingPhase::BorderFetchAttr => {
                    self.border_pair(x, y);
                    self.attr_byte1 = fetch(t.fetch_address);
                }
                RenderingPhase::DisplayByte1 => self.byte1_pair(x, y),
                RenderingPhase::DisplayByte1FetchByte2 => {
                    self.byte1_pair(x, y);
                    self.pixel_byte2 = fetch(t.fetch_address);
                }
                RenderingPhase::DisplayByte1FetchAttr2 => {
                    self.byte1_pair(x, y);
                    self.attr_byte2 = fetch(t.fetch_address);
                }
                RenderingPhase::DisplayByte2 => self.byte2_pair(x, y),
                RenderingPhase::DisplayByte2FetchByte1 => {
                    self.byte2_pair(x, y);
                    self.pixel_byte1 = fetch(t.fetch_address);
                }
                RenderingPhase::DisplayByte2FetchAttr1 => {
                    self.byte2_pair(x, y);
                    self.attr_byte1 = fetch(t.fetch_address);
                }
            }
        }
    }

    /// Start a frame: advance the frame counter, flip FLASH when due, and
    /// draw the cycles that ran over from the previous frame.
    pub fn on_new_frame(&mut self, fetch: impl FnMut(u16) -> u8) {
        self.frame_count = self.frame_count.wrapping_add(1);
        if self.frame_count % self.flash_toggle_frames == 0 {
            self.flash_on = !self.flash_on;
        }
        self.sink.start_new_frame();
        self.render_range(0, self.overflow, fetch);
    }

    /// Hand the finished frame to the sink and raise the completion flag.
    pub fn on_frame_completed(&mut self) {
        self.sink.display_frame(&self.pixels, self.width);
        self.frame_complete = true;
    }

    /// Has a frame completed since the last call? Auto-clears on read.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    /// Cycles the last frame ran past its end.
    #[must_use]
    pub fn overflow(&self) -> u32 {
        self.overflow
    }

    pub fn set_overflow(&mut self, overflow: u32) {
        self.overflow = overflow;
    }

    /// Contention delay at `tact`, reduced modulo the frame length.
    #[must_use]
    pub fn contention_at(&self, tact: u32) -> u8 {
        self.tacts.contention(tact)
    }

    #[must_use]
    pub fn border_colour(&self) -> u8 {
        self.border
    }

    /// Set border colour (0-7).
    pub fn set_border_colour(&mut self, colour: u8) {
        self.border = colour & 0x07;
    }

    #[must_use]
    pub fn flash_on(&self) -> bool {
        self.flash_on
    }

    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Palette indices, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.len() / self.width
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    /// The pixel buffer converted to ARGB32.
    #[must_use]
    pub fn to_argb(&self) -> Vec<u32> {
        self.pixels.iter().map(|&i| PALETTE[usize::from(i & 0x0F)]).collect()
    }

    /// Power-on state: white border, FLASH off, blank buffer.
    pub fn reset(&mut self) {
        self.border = 7;
        self.flash_on = false;
        self.frame_count = 0;
        self.overflow = 0;
        self.pixel_byte1 = 0;
        self.pixel_byte2 = 0;
        self.attr_byte1 = 0;
        self.attr_byte2 = 0;
        self.frame_complete = false;
        self.pixels.fill(0);
    }

    #[must_use]
    pub fn state(&self) -> ScreenState {
        ScreenState {
            border: self.border,
            flash_on: self.flash_on,
            frame_count: self.frame_count,
            overflow: self.overflow,
            pixel_byte1: self.pixel_byte1,
            pixel_byte2: self.pixel_byte2,
            attr_byte1: self.attr_byte1,
            attr_byte2: self.attr_byte2,
            frame_complete: self.frame_complete,
            pixels: self.pixels.clone(),
        }
    }

    /// Restore a saved state. Returns `false`, changing nothing, if the
    /// buffer size does not match this renderer's timing.
    pub fn restore(&mut self, state: &ScreenState) -> bool {
        if state.pixels.len() != self.pixels.len() {
            return false;
        }
        self.border = state.border & 0x07;
        self.flash_on = state.flash_on;
        self.frame_count = state.frame_count;
        self.overflow = state.overflow;
        self.pixel_byte1 = state.pixel_byte1;
        self.pixel_byte2 = state.pixel_byte2;
        self.attr_byte1 = state.attr_byte1;
        self.attr_byte2 = state.attr_byte2;
        self.frame_complete = state.frame_complete;
        self.pixels.copy_from_slice(&state.pixels);
        true
    }

    fn border_pair(&mut self, x: usize, y: usize) {
        let i = y * self.width + x;
        self.pixels[i] = self.border;
        self.pixels[i + 1] = self.border;
    }

    fn byte1_pair(&mut self, x: usize, y: usize) {
        self.display_pair(x, y, self.pixel_byte1, self.attr_byte1);
        self.pixel_byte1 <<= 2;
    }

    fn byte2_pair(&mut self, x: usize, y: usize) {
        self.display_pair(x, y, self.pixel_byte2, self.attr_byte2);
        self.pixel_byte2 <<= 2;
    }

    /// Draw the top two bits of `bits` in the colours of `attr`.
    fn display_pair(&mut self, x: usize, y: usize, bits: u8, attr: u8) {
        let (ink, paper) = attr_colours(attr, self.flash_on);
        let i = y * self.width + x;
        self.pixels[i] = if bits & 0x80 != 0 { ink } else { paper };
        self.pixels[i + 1] = if bits & 0x40 != 0 { ink } else { paper };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingParams;
    use std::cell::RefCell;

    /// 48K of address space with only display memory populated.
    struct TestMemory {
        data: Vec<u8>,
    }

    impl TestMemory {
        fn new() -> Self {
            Self {
                data: vec![0; 0x10000],
            }
        }

        fn peek(&self, addr: u16) -> u8 {
            self.data[usize::from(addr)]
        }
    }

    fn renderer() -> ScreenRenderer {
        let tacts = TactTable::from_params(TimingParams::spectrum_48k()).unwrap();
        ScreenRenderer::new(tacts, 3_500_000)
    }

    fn render_frame(ula: &mut ScreenRenderer, mem: &TestMemory) {
        let last = ula.tact_table().frame_tacts() - 1;
        ula.render_range(0, last, |a| mem.peek(a));
    }

    #[test]
    fn border_fills_visible_area_outside_display() {
        let mut ula = renderer();
        ula.set_border_colour(2);
        render_frame(&mut ula, &TestMemory::new());
        assert_eq!(ula.pixel(0, 0), 2);
        assert_eq!(ula.pixel(351, 287), 2);
        assert_eq!(ula.pixel(47, 100), 2, "left border");
        assert_eq!(ula.pixel(48, 100), 0, "display paper");
    }

    #[test]
    fn border_colour_masks_to_three_bits() {
        let mut ula = renderer();
        ula.set_border_colour(0xFD);
        assert_eq!(ula.border_colour(), 5);
    }

    #[test]
    fn draws_bitmap_in_attribute_colours() {
        let mut mem = TestMemory::new();
        mem.data[0x4000] = 0b1000_0001;
        mem.data[0x5800] = 0x0E; // ink 6, paper 1
        let mut ula = renderer();
        render_frame(&mut ula, &mem);
        assert_eq!(ula.pixel(48, 48), 6);
        assert_eq!(ula.pixel(49, 48), 1);
        assert_eq!(ula.pixel(55, 48), 6);
    }

    #[test]
    fn second_byte_of_group_uses_its_own_fetch() {
        let mut mem = TestMemory::new();
        mem.data[0x4001] = 0xFF;
        mem.data[0x5801] = 0x38 | 0x02; // ink 2, paper 7
        let mut ula = renderer();
        render_frame(&mut ula, &mem);
        assert_eq!(ula.pixel(55, 48), 0, "first byte: ink 0 paper 0");
        assert_eq!(ula.pixel(56, 48), 2, "second byte inked");
        assert_eq!(ula.pixel(63, 48), 2);
    }

    #[test]
    fn fetch_closure_is_called_once_per_fetch_phase() {
        let calls = RefCell::new(0u32);
        let mut ula = renderer();
        let last = ula.tact_table().frame_tacts() - 1;
        ula.render_range(0, last, |_| {
            *calls.borrow_mut() += 1;
            0
        });
        // 32 bitmap + 32 attribute fetches per display line.
        assert_eq!(*calls.borrow(), 192 * 64);
    }

    #[test]
    fn range_wraps_endpoints_modulo_frame() {
        let mut a = renderer();
        let mut b = renderer();
        a.set_border_colour(4);
        b.set_border_colour(4);
        let mem = TestMemory::new();
        a.render_range(16 * 224 + 40, 16 * 224 + 50, |x| mem.peek(x));
        b.render_range(69_888 + 16 * 224 + 40, 69_888 + 16 * 224 + 50, |x| mem.peek(x));
        assert_eq!(a.pixels(), b.pixels());
        assert_eq!(a.pixel(0, 0), 4);
    }

    #[test]
    fn reversed_range_draws_nothing() {
        let mut ula = renderer();
        ula.set_border_colour(3);
        ula.render_range(16 * 224 + 50, 16 * 224 + 40, |_| 0);
        assert!(ula.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn flash_flips_every_25_frames() {
        let mut ula = renderer();
        for _ in 0..24 {
            ula.on_new_frame(|_| 0);
        }
        assert!(!ula.flash_on());
        ula.on_new_frame(|_| 0);
        assert!(ula.flash_on());
        for _ in 0..25 {
            ula.on_new_frame(|_| 0);
        }
        assert!(!ula.flash_on());
    }

    #[test]
    fn flash_swaps_ink_and_paper() {
        let mut mem = TestMemory::new();
        mem.data[0x4000] = 0xFF;
        mem.data[0x5800] = 0x80 | 0x08 | 0x04; // flash, paper 1, ink 4
        let mut ula = renderer();
        render_frame(&mut ula, &mem);
        assert_eq!(ula.pixel(48, 48), 4);
        for _ in 0..25 {
            ula.on_new_frame(|_| 0);
        }
        render_frame(&mut ula, &mem);
        assert_eq!(ula.pixel(48, 48), 1);
    }

    struct CountingSink(Rc<RefCell<Vec<usize>>>);

    impl FrameSink for CountingSink {
        fn display_frame(&mut self, pixels: &[u8], width: usize) {
            self.0.borrow_mut().push(pixels.len() / width);
        }
    }

    #[test]
    fn completed_frame_goes_to_sink_and_sets_flag() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ula = renderer();
        ula.set_frame_sink(Box::new(CountingSink(Rc::clone(&seen))));
        ula.on_frame_completed();
        assert_eq!(*seen.borrow(), [288]);
        assert!(ula.take_frame_complete());
        assert!(!ula.take_frame_complete(), "flag clears on read");
    }

    #[test]
    fn new_frame_renders_overflow() {
        let mut ula = renderer();
        ula.set_border_colour(5);
        ula.set_overflow(16 * 224 + 45);
        ula.on_new_frame(|_| 0);
        assert_eq!(ula.pixel(10, 0), 5);
        assert_eq!(ula.pixel(12, 0), 0, "past the overflow");
    }

    #[test]
    fn state_round_trip_and_size_check() {
        let mut ula = renderer();
        ula.set_border_colour(6);
        render_frame(&mut ula, &TestMemory::new());
        let saved = ula.state();
        ula.reset();
        assert_eq!(ula.border_colour(), 7);
        assert!(ula.restore(&saved));
        assert_eq!(ula.state(), saved);

        let mut short = saved.clone();
        short.pixels.pop();
        assert!(!ula.restore(&short));
    }
}
