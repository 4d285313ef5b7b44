//! Sinclair ULA screen timing and rendering.
//!
//! The ULA draws the border and the 256x192 display while stealing memory
//! cycles from the CPU. This crate models that activity as a table with one
//! entry per CPU cycle of the frame, and renders frames by walking it.
//!
//! # Standalone IC
//!
//! Display memory is reached through closures passed by the caller, so the
//! renderer does not care how RAM is banked.
//!
//! # Timing
//!
//! [`TimingParams`] holds the raw line and cycle counts for a model;
//! [`ScreenTiming`] validates them and caches the derived values. The 48K
//! frame is 224 cycles x 312 lines = 69,888 cycles; the 128K family runs 228
//! cycles x 311 lines = 70,908.
//!
//! # Screen memory layout
//!
//! Bitmap at $4000-$57FF (6144 bytes), attributes at $5800-$5AFF (768 bytes).
//! Bitmap address: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`
//! Attribute address: `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`
//!
//! # Contention
//!
//! Each display cycle carries the delay a contended CPU access would suffer
//! on it. Across a display line the delays repeat `[6, 5, 4, 3, 2, 1, 0, 0]`
//! starting two cycles before the first pixel.

mod palette;
mod render;
mod tact;
mod timing;

pub use palette::{PALETTE, attr_colours};
pub use render::{FrameSink, NullSink, ScreenRenderer, ScreenState};
pub use tact::{RenderingPhase, RenderingTact, TactTable};
pub use timing::{
    MAX_DISPLAY_LINE_TIME, MAX_DISPLAY_LINES, ScreenTiming, TimingError, TimingParams,
};
