//! CPU cycle clock seen by bus devices.

/// The CPU as the bus sees it: a cycle counter that restarts every frame and
/// can be stalled.
///
/// Bus devices read the counter to learn where the beam is and call
/// [`consume_cycles`](CpuClock::consume_cycles) to charge wait states.
pub trait CpuClock {
    /// Cycles elapsed since the start of the current frame.
    ///
    /// May run past the frame length by the length of the last instruction;
    /// consumers reduce it modulo the frame length.
    fn frame_cycles(&self) -> u32;

    /// Stall the CPU for `count` cycles.
    fn consume_cycles(&mut self, count: u32);
}

/// A bare frame cycle counter.
///
/// Hosts that drive the CPU elsewhere can mirror its counter here, and tests
/// use it to position the beam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounter {
    cycles: u32,
    stalled: u64,
}

impl CycleCounter {
    #[must_use]
    pub const fn new(cycles: u32) -> Self {
        Self { cycles, stalled: 0 }
    }

    /// Advance by `count` cycles of normal execution.
    pub fn advance(&mut self, count: u32) {
        self.cycles = self.cycles.wrapping_add(count);
    }

    /// Jump to an absolute frame cycle.
    pub fn set(&mut self, cycles: u32) {
        self.cycles = cycles;
    }

    /// Restart the frame, keeping the cycles that ran past its end.
    pub fn start_frame(&mut self, overflow: u32) {
        self.cycles = overflow;
    }

    /// Total cycles charged through [`CpuClock::consume_cycles`].
    #[must_use]
    pub const fn stalled(&self) -> u64 {
        self.stalled
    }
}

impl CpuClock for CycleCounter {
    fn frame_cycles(&self) -> u32 {
        self.cycles
    }

    fn consume_cycles(&mut self, count: u32) {
        self.cycles = self.cycles.wrapping_add(count);
        self.stalled += u64::from(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumed_cycles_advance_the_frame() {
        let mut clock = CycleCounter::new(100);
        clock.consume_cycles(6);
        clock.advance(4);
        assert_eq!(clock.frame_cycles(), 110);
        assert_eq!(clock.stalled(), 6, "only stalls are counted as stalled");
    }

    #[test]
    fn start_frame_keeps_overflow() {
        let mut clock = CycleCounter::new(69_893);
        clock.start_frame(5);
        assert_eq!(clock.frame_cycles(), 5);
    }
}
