//! The Spectrum bus: memory, screen and ports wired for one model.
//!
//! The CPU lives outside this crate. It drives the machine through
//! [`CpuClock`]: every memory or port access passes the clock so the bus
//! can find the beam position, charge contention and bring the screen up to
//! date before the access lands.

use std::rc::Rc;

use emu_core::{CpuClock, Observable, Snapshot, SnapshotError, Value};
use serde::{Deserialize, Serialize};
use sinclair_ula::{FrameSink, ScreenRenderer, ScreenState, TactTable};

use crate::codec;
use crate::config::{ConfigError, SpectrumConfig, SpectrumModel};
use crate::input::InputState;
use crate::memory::{MemoryPagingDevice, MemoryState, SlotSource};
use crate::peripherals::Peripherals;
use crate::ports::{DispatcherState, HostContext, PortContext, PortDispatcher, variants};

const STATE_VERSION: u16 = 1;

/// How a port access is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoContention {
    /// ULA-backed models: the four-cycle I/O access is stretched by the
    /// ULA depending on the port's low bit and whether its high byte
    /// addresses contended memory.
    ///
    /// | High byte contended? | Even port? | Pattern |
    /// |----------------------|------------|---------|
    /// | No | No | N:4 |
    /// | No | Yes | N:1, C:3 |
    /// | Yes | Yes | C:1, C:3 |
    /// | Yes | No | C:1, C:1, C:1, C:1 |
    Ula,
    /// A flat cost per access.
    Fixed(u32),
}

impl IoContention {
    #[must_use]
    pub fn for_model(model: SpectrumModel) -> Self {
        match model {
            SpectrumModel::Spectrum48K | SpectrumModel::Spectrum128K => Self::Ula,
            SpectrumModel::SpectrumPlus3 | SpectrumModel::SpectrumNext => Self::Fixed(4),
        }
    }

    /// Total cycles an access to `address` starting at `start` takes,
    /// wait states included.
    #[must_use]
    pub fn cycles(self, tacts: &TactTable, start: u32, address: u16, contended_high: bool) -> u32 {
        if let Self::Fixed(cycles) = self {
            return cycles;
        }
        let even = address & 0x0001 == 0;
        let mut now = start;
        let mut step = |contend: bool, len: u32| {
            if contend {
                now += u32::from(tacts.contention(now));
            }
            now += len;
        };
        match (contended_high, even) {
            (false, false) => step(false, 4),
            (false, true) => {
                step(false, 1);
                step(true, 3);
            }
            (true, true) => {
                step(true, 1);
                step(true, 3);
            }
            (true, false) => {
                for _ in 0..4 {
                    step(true, 1);
                }
            }
        }
        now - start
    }
}

#[derive(Serialize, Deserialize)]
struct MachineState {
    version: u16,
    model: String,
    next_tact: u32,
    screen: ScreenState,
    memory: MemoryState,
    ports: DispatcherState,
}

/// A ZX Spectrum bus.
pub struct Spectrum {
    model: SpectrumModel,
    tacts: Rc<TactTable>,
    memory: MemoryPagingDevice,
    screen: ScreenRenderer,
    ports: PortDispatcher,
    input: InputState,
    peripherals: Peripherals,
    io_contention: IoContention,
    /// First tact of the current frame not yet rendered.
    next_tact: u32,
}

impl Spectrum {
    /// Build a machine from `config`.
    pub fn new(config: &SpectrumConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = config.model;
        let tacts = TactTable::from_params(config.timing.unwrap_or_else(|| model.timing()))?;
        let layout = model.memory_layout();
        let host = HostContext {
            tacts: Rc::clone(&tacts),
            ula_issue: config.ula_issue,
            ram_pages: layout.ram_pages,
            ram_banks: layout.ram_banks(),
        };
        let memory = MemoryPagingDevice::new(layout, config.roms.clone());
        let screen = ScreenRenderer::new(Rc::clone(&tacts), config.cpu_frequency);
        let mut ports = variants::port_map(model, config.kempston);
        ports.on_attached(&host);

        log::info!(
            "Spectrum {}: {} tacts per frame, {} port handlers",
            model.name(),
            tacts.frame_tacts(),
            ports.handlers().len()
        );

        Ok(Self {
            model,
            tacts,
            memory,
            screen,
            ports,
            input: InputState::new(),
            peripherals: Peripherals::new(),
            io_contention: IoContention::for_model(model),
            next_tact: 0,
        })
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.model
    }

    #[must_use]
    pub fn tact_table(&self) -> &Rc<TactTable> {
        &self.tacts
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryPagingDevice {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryPagingDevice {
        &mut self.memory
    }

    #[must_use]
    pub fn screen(&self) -> &ScreenRenderer {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ScreenRenderer {
        &mut self.screen
    }

    #[must_use]
    pub fn ports(&self) -> &PortDispatcher {
        &self.ports
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    #[must_use]
    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals {
        &mut self.peripherals
    }

    #[must_use]
    pub fn io_contention(&self) -> IoContention {
        self.io_contention
    }

    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.screen.set_frame_sink(sink);
    }

    // === CPU bus ===

    /// CPU memory read. Charges contention first when `addr` is contended.
    ///
    /// Only wait states are charged; the CPU accounts for the access itself.
    pub fn read_memory(&mut self, cpu: &mut impl CpuClock, addr: u16) -> u8 {
        let contended = self.memory.is_contended(addr);
        if contended {
            cpu.consume_cycles(u32::from(self.tacts.contention(cpu.frame_cycles())));
        }
        self.memory.read(addr, contended)
    }

    /// CPU memory write. The screen is brought up to date first so a write
    /// to display memory shows from the right cycle.
    pub fn write_memory(&mut self, cpu: &mut impl CpuClock, addr: u16, value: u8) {
        let contended = self.memory.is_contended(addr);
        if contended {
            cpu.consume_cycles(u32::from(self.tacts.contention(cpu.frame_cycles())));
        }
        self.render_to(cpu.frame_cycles());
        self.memory.write(addr, value, contended);
    }

    /// CPU port read. Charges the whole I/O access, wait states included,
    /// then renders up to the current cycle and dispatches.
    pub fn read_port(&mut self, cpu: &mut impl CpuClock, address: u16) -> u8 {
        self.charge_io(cpu, address);
        let tact = cpu.frame_cycles();
        self.render_to(tact);
        self.dispatch_read(tact, address)
    }

    /// CPU port write. Timed like [`read_port`](Self::read_port).
    pub fn write_port(&mut self, cpu: &mut impl CpuClock, address: u16, value: u8) {
        self.charge_io(cpu, address);
        let tact = cpu.frame_cycles();
        self.render_to(tact);
        self.dispatch_write(tact, address, value);
    }

    fn charge_io(&self, cpu: &mut impl CpuClock, address: u16) {
        let contended_high = self.memory.is_contended(address);
        let cycles =
            self.io_contention
                .cycles(&self.tacts, cpu.frame_cycles(), address, contended_high);
        cpu.consume_cycles(cycles);
    }

    /// Route a port read at `frame_tact` without timing or rendering.
    pub fn dispatch_read(&mut self, frame_tact: u32, address: u16) -> u8 {
        let mut ctx = PortContext {
            memory: &mut self.memory,
            screen: &mut self.screen,
            input: &self.input,
            peripherals: &mut self.peripherals,
            frame_tact,
        };
        self.ports.read(address, &mut ctx)
    }

    /// Route a port write at `frame_tact` without timing or rendering.
    pub fn dispatch_write(&mut self, frame_tact: u32, address: u16, value: u8) {
        let mut ctx = PortContext {
            memory: &mut self.memory,
            screen: &mut self.screen,
            input: &self.input,
            peripherals: &mut self.peripherals,
            frame_tact,
        };
        self.ports.write(address, value, &mut ctx);
    }

    // === Frame lifecycle ===

    /// Render tacts `from..=to` of the current frame.
    pub fn render_range(&mut self, from: u32, to: u32) {
        let memory = &self.memory;
        self.screen.render_range(from, to, |addr| memory.read_screen(addr));
    }

    /// Render every tact not yet drawn up to and including `tact`, capped
    /// at the last tact of the frame.
    pub fn render_to(&mut self, tact: u32) {
        let last = self.tacts.frame_tacts() - 1;
        let to = tact.min(last);
        if self.next_tact > to {
            return;
        }
        self.render_range(self.next_tact, to);
        self.next_tact = to + 1;
    }

    /// Start a frame and draw the cycles carried over from the last one.
    pub fn on_new_frame(&mut self) {
        let memory = &self.memory;
        self.screen.on_new_frame(|addr| memory.read_screen(addr));
        self.next_tact = self.screen.overflow() + 1;
    }

    /// Hand the finished frame to the frame sink.
    pub fn on_frame_completed(&mut self) {
        self.screen.on_frame_completed();
    }

    /// Close the frame the CPU has just run past: draw what is left, show
    /// it, and open the next frame. Returns the overflow, the cycles the
    /// CPU ran beyond the frame length, which the caller carries into the
    /// next frame's counter.
    pub fn end_frame(&mut self, cpu: &impl CpuClock) -> u32 {
        let frame = self.tacts.frame_tacts();
        self.render_to(frame - 1);
        self.on_frame_completed();
        let overflow = cpu.frame_cycles().saturating_sub(frame);
        self.screen.set_overflow(overflow);
        self.on_new_frame();
        overflow
    }

    /// Has a frame completed since the last call? Auto-clears on read.
    pub fn take_frame_complete(&mut self) -> bool {
        self.screen.take_frame_complete()
    }

    /// Hardware reset. Paging returns to its defaults and is unlocked; RAM
    /// keeps its contents.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.screen.reset();
        self.ports.reset();
        self.peripherals.reset_lines();
        self.next_tact = 0;
    }
}

impl Snapshot for Spectrum {
    fn get_state(&self) -> Vec<u8> {
        let state = MachineState {
            version: STATE_VERSION,
            model: self.model.name().to_string(),
            next_tact: self.next_tact,
            screen: self.screen.state(),
            memory: self.memory.save(),
            ports: self.ports.save(),
        };
        codec::encode("machine", &state)
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError> {
        let state: MachineState = codec::decode(blob)?;
        codec::check_version(state.version, STATE_VERSION)?;
        if state.model != self.model.name() {
            return Err(SnapshotError::Layout(format!(
                "snapshot is for a Spectrum {}, this is a Spectrum {}",
                state.model,
                self.model.name()
            )));
        }
        if state.screen.pixels.len() != self.screen.pixels().len() {
            return Err(SnapshotError::Layout(format!(
                "screen buffer of {} pixels, expected {}",
                state.screen.pixels.len(),
                self.screen.pixels().len()
            )));
        }

        let previous_ports = self.ports.clone();
        self.ports.load(state.ports)?;
        if let Err(e) = self.memory.load(state.memory) {
            self.ports = previous_ports;
            return Err(e);
        }
        self.screen.restore(&state.screen);
        self.next_tact = state.next_tact;
        Ok(())
    }
}

impl Observable for Spectrum {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("paging.") {
            match rest {
                "enabled" => Some(self.memory.paging_enabled().into()),
                "rom" => Some(Value::U8(self.memory.selected_rom() as u8)),
                "shadow" => Some(self.memory.shadow_screen().into()),
                "slots" => Some(Value::List(
                    self.memory
                        .slots()
                        .iter()
                        .map(|slot| match slot {
                            SlotSource::Rom => Value::Name("rom".to_string()),
                            SlotSource::Ram(page) => Value::U16(*page),
                        })
                        .collect(),
                )),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("screen.") {
            match rest {
                "border" => Some(Value::U8(self.screen.border_colour())),
                "frame" => Some(Value::U32(self.screen.frame_count())),
                "flash" => Some(self.screen.flash_on().into()),
                "next_tact" => Some(Value::U32(self.next_tact)),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("tact.") {
            let tact: u32 = rest.parse().ok()?;
            let entry = self.tacts.get(tact);
            Some(Value::List(vec![
                Value::Name(entry.phase.name().to_string()),
                Value::U8(entry.contention),
                Value::U16(entry.fetch_address),
            ]))
        } else if let Some(rest) = path.strip_prefix("memory.") {
            let addr = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
                u16::from_str_radix(hex, 16).ok()
            } else if let Some(hex) = rest.strip_prefix('$') {
                u16::from_str_radix(hex, 16).ok()
            } else {
                rest.parse().ok()
            };
            addr.map(|a| Value::U8(self.memory.peek(a)))
        } else {
            match path {
                "model" => Some(Value::Name(self.model.name().to_string())),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "model",
            "paging.enabled",
            "paging.rom",
            "paging.shadow",
            "paging.slots",
            "screen.border",
            "screen.frame",
            "screen.flash",
            "screen.next_tact",
            "tact.<n>",
            "memory.<address>",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BANK_SIZE;
    use emu_core::CycleCounter;
    use sinclair_ula::RenderingPhase;

    fn make_spectrum(model: SpectrumModel) -> Spectrum {
        let rom_count = model.memory_layout().rom_count;
        let roms = (0..rom_count).map(|i| vec![i as u8; BANK_SIZE]).collect();
        Spectrum::new(&SpectrumConfig::new(model, roms)).unwrap()
    }

    fn first_tact(spectrum: &Spectrum, phase: RenderingPhase) -> u32 {
        spectrum
            .tact_table()
            .iter()
            .position(|t| t.phase == phase)
            .unwrap() as u32
    }

    #[test]
    fn new_rejects_bad_roms() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![vec![0; 100]]);
        assert!(matches!(
            Spectrum::new(&config),
            Err(ConfigError::RomSize { index: 0, found: 100 })
        ));
    }

    #[test]
    fn io_contention_uncontended_odd_port_is_four_cycles() {
        let spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        let tact = first_tact(&spectrum, RenderingPhase::DisplayByte1FetchByte2);
        let io = spectrum.io_contention();
        assert_eq!(io.cycles(spectrum.tact_table(), tact, 0x00FF, false), 4);
    }

    #[test]
    fn io_contention_ula_port_in_display_is_stretched() {
        let spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        // Sub-phase 0 has contention 4; N:1 moves to sub-phase 1 (3).
        let tact = first_tact(&spectrum, RenderingPhase::DisplayByte1);
        let io = spectrum.io_contention();
        assert_eq!(io.cycles(spectrum.tact_table(), tact, 0x00FE, false), 4 + 3);
    }

    #[test]
    fn io_contention_outside_display_is_plain() {
        let spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        let io = spectrum.io_contention();
        for address in [0x00FE, 0x00FF, 0x40FE, 0x40FF] {
            assert_eq!(io.cycles(spectrum.tact_table(), 0, address, true), 4);
        }
    }

    #[test]
    fn plus3_charges_flat_io_cost() {
        let mut spectrum = make_spectrum(SpectrumModel::SpectrumPlus3);
        let tact = first_tact(&spectrum, RenderingPhase::DisplayByte1);
        let mut cpu = CycleCounter::new(tact);
        spectrum.read_port(&mut cpu, 0x40FE);
        assert_eq!(cpu.stalled(), 4);
        assert_eq!(cpu.frame_cycles(), tact + 4);
    }

    #[test]
    fn contended_memory_read_charges_wait_states() {
        let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        let tact = first_tact(&spectrum, RenderingPhase::DisplayByte1);
        let mut cpu = CycleCounter::new(tact);
        spectrum.read_memory(&mut cpu, 0x4000);
        assert_eq!(cpu.stalled(), 4);

        let mut cpu = CycleCounter::new(tact);
        spectrum.read_memory(&mut cpu, 0x8000);
        assert_eq!(cpu.stalled(), 0, "only $4000-$7FFF is contended");
    }

    #[test]
    fn border_write_renders_up_to_the_write() {
        let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        let mut cpu = CycleCounter::new(0);
        spectrum.write_port(&mut cpu, 0x00FE, 2);
        // $00FE outside the display costs a plain four cycles.
        assert_eq!(cpu.frame_cycles(), 4);
        assert_eq!(spectrum.screen().border_colour(), 2);
        assert_eq!(spectrum.query("screen.next_tact"), Some(Value::U32(5)));
    }

    #[test]
    fn end_frame_carries_overflow() {
        let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K);
        let frame = spectrum.tact_table().frame_tacts();
        let cpu = CycleCounter::new(frame + 5);
        assert_eq!(spectrum.end_frame(&cpu), 5);
        assert!(spectrum.take_frame_complete());
        assert!(!spectrum.take_frame_complete());
        assert_eq!(spectrum.screen().frame_count(), 1);
        assert_eq!(spectrum.query("screen.next_tact"), Some(Value::U32(6)));
    }

    #[test]
    fn observable_paths() {
        let mut spectrum = make_spectrum(SpectrumModel::Spectrum128K);
        spectrum.dispatch_write(0, 0x7FFD, 0x13);
        assert_eq!(spectrum.query("paging.rom"), Some(Value::U8(1)));
        assert_eq!(spectrum.query("paging.enabled"), Some(Value::Bool(true)));
        assert_eq!(
            spectrum.query("paging.slots"),
            Some(Value::List(vec![
                Value::Name("rom".to_string()),
                Value::U16(5),
                Value::U16(2),
                Value::U16(3),
            ]))
        );
        assert_eq!(spectrum.query("model"), Some(Value::Name("128K".to_string())));
        assert_eq!(spectrum.query("memory.$0000"), Some(Value::U8(1)));
        assert!(spectrum.query("tact.0").is_some());
        assert_eq!(spectrum.query("paging.nope"), None);
    }

    #[test]
    fn reset_keeps_ram() {
        let mut spectrum = make_spectrum(SpectrumModel::Spectrum128K);
        let mut cpu = CycleCounter::new(0);
        spectrum.write_memory(&mut cpu, 0x8000, 0xAB);
        spectrum.dispatch_write(0, 0x7FFD, 0x20);
        assert!(!spectrum.memory().paging_enabled());
        spectrum.reset();
        assert!(spectrum.memory().paging_enabled());
        assert_eq!(spectrum.memory().peek(0x8000), 0xAB);
        assert_eq!(spectrum.screen().border_colour(), 7);
    }
}
