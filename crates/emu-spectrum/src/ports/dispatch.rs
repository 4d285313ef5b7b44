//! Ordered port map.
//!
//! Handlers are scanned in registration order and the first one that claims
//! the address in the right direction wins. Overlapping claims are allowed:
//! registration order is the priority. The builder reports overlaps at debug
//! level so an accidental shadow shows up in the log.

use emu_core::{Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};

use super::{FloatingBus, HostContext, PortContext, PortDevice, PortHandler};
use crate::codec;

const STATE_VERSION: u16 = 1;

/// Answer for a read no handler claims.
#[derive(Debug, Clone)]
pub enum UnhandledRead {
    /// ULA-backed models: whatever the ULA has on the bus.
    FloatingBus(FloatingBus),
    /// A fixed idle-bus value.
    Idle(u8),
}

impl UnhandledRead {
    fn read(&self, ctx: &mut PortContext<'_>) -> u8 {
        match self {
            Self::FloatingBus(bus) => bus.read(ctx),
            Self::Idle(value) => *value,
        }
    }
}

/// Position of a handler in its port map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(usize);

/// Assembles a [`PortDispatcher`].
pub struct PortMapBuilder {
    handlers: Vec<PortHandler>,
    links: Vec<(usize, usize)>,
    unhandled: UnhandledRead,
}

impl PortMapBuilder {
    #[must_use]
    pub fn new(unhandled: UnhandledRead) -> Self {
        Self {
            handlers: Vec::new(),
            links: Vec::new(),
            unhandled,
        }
    }

    /// Append a handler. Earlier handlers take priority.
    pub fn add(&mut self, handler: PortHandler) -> HandlerId {
        self.handlers.push(handler);
        HandlerId(self.handlers.len() - 1)
    }

    /// Deliver notices published by writes to `from` to `to`.
    pub fn link(&mut self, from: HandlerId, to: HandlerId) -> &mut Self {
        self.links.push((from.0, to.0));
        self
    }

    #[must_use]
    pub fn build(self) -> PortDispatcher {
        let dispatcher = PortDispatcher {
            handlers: self.handlers,
            links: self.links,
            unhandled: self.unhandled,
        };
        if cfg!(debug_assertions) {
            for (a, b) in dispatcher.overlaps() {
                log::debug!(
                    "port handler {a} {:?} shadows handler {b} {:?}",
                    dispatcher.handlers[a].descriptor(),
                    dispatcher.handlers[b].descriptor()
                );
            }
        }
        dispatcher
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DispatcherState {
    version: u16,
    devices: Vec<PortDevice>,
}

/// Routes port reads and writes for one machine variant.
#[derive(Debug, Clone)]
pub struct PortDispatcher {
    handlers: Vec<PortHandler>,
    links: Vec<(usize, usize)>,
    unhandled: UnhandledRead,
}

impl PortDispatcher {
    #[must_use]
    pub fn builder(unhandled: UnhandledRead) -> PortMapBuilder {
        PortMapBuilder::new(unhandled)
    }

    /// Read `address` from the first read-capable handler claiming it, or
    /// the unhandled value.
    pub fn read(&mut self, address: u16, ctx: &mut PortContext<'_>) -> u8 {
        let handler = self
            .handlers
            .iter_mut()
            .find(|h| h.descriptor().can_read() && h.descriptor().matches(address));
        match handler {
            Some(h) => h.read(address, ctx),
            None => {
                log::trace!("unhandled port read {address:#06X}");
                self.unhandled.read(ctx)
            }
        }
    }

    /// Write `value` to the first write-capable handler claiming `address`,
    /// then deliver any notice it publishes to its linked handlers.
    pub fn write(&mut self, address: u16, value: u8, ctx: &mut PortContext<'_>) {
        let Some(index) = self
            .handlers
            .iter()
            .position(|h| h.descriptor().can_write() && h.descriptor().matches(address))
        else {
            log::trace!("unhandled port write {address:#06X} <- {value:#04X}");
            return;
        };
        if let Some(notice) = self.handlers[index].write(value, ctx) {
            for &(from, to) in &self.links {
                if from == index {
                    self.handlers[to].notify(notice, ctx);
                }
            }
        }
    }

    /// Restore every handler's power-on defaults.
    pub fn reset(&mut self) {
        for handler in &mut self.handlers {
            handler.reset();
        }
    }

    /// Bind every handler, and the unhandled-read source, to the machine.
    pub fn on_attached(&mut self, host: &HostContext) {
        for handler in &mut self.handlers {
            handler.on_attached(host);
        }
        if let UnhandledRead::FloatingBus(bus) = &mut self.unhandled {
            bus.attach(host);
        }
    }

    /// Pairs of handler positions `(earlier, later)` that both claim some
    /// address in a shared direction. The later one never sees those
    /// accesses.
    #[must_use]
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.handlers.iter().enumerate() {
            for (j, b) in self.handlers.iter().enumerate().skip(i + 1) {
                if a.descriptor().overlaps(b.descriptor()) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    #[must_use]
    pub fn handlers(&self) -> &[PortHandler] {
        &self.handlers
    }

    /// The first handler whose device satisfies `pred`.
    pub fn find(&self, pred: impl Fn(&PortDevice) -> bool) -> Option<&PortHandler> {
        self.handlers.iter().find(|h| pred(h.device()))
    }
}

impl PortDispatcher {
    pub(crate) fn save(&self) -> DispatcherState {
        DispatcherState {
            version: STATE_VERSION,
            devices: self.handlers.iter().map(|h| h.device().clone()).collect(),
        }
    }

    /// Take every handler's saved device state, or nothing if any of them
    /// does not fit this port map.
    pub(crate) fn load(&mut self, state: DispatcherState) -> Result<(), SnapshotError> {
        codec::check_version(state.version, STATE_VERSION)?;
        if state.devices.len() != self.handlers.len() {
            return Err(SnapshotError::Layout(format!(
                "{} port handlers, expected {}",
                state.devices.len(),
                self.handlers.len()
            )));
        }
        let mut staged = self.handlers.clone();
        for (i, (handler, device)) in staged.iter_mut().zip(state.devices).enumerate() {
            if !handler.restore_device(device) {
                return Err(SnapshotError::Layout(format!(
                    "port handler {i} is a different device"
                )));
            }
        }
        self.handlers = staged;
        Ok(())
    }
}

impl Snapshot for PortDispatcher {
    fn get_state(&self) -> Vec<u8> {
        codec::encode("port", &self.save())
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError> {
        self.load(codec::decode(blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputState;
    use crate::memory::{BANK_SIZE, MemoryLayout, MemoryPagingDevice};
    use crate::peripherals::Peripherals;
    use crate::ports::{
        LatchPort, PortAccess, PortDescriptor, SoundRegisterData, SoundRegisterSelect,
    };
    use emu_core::RegisterBank;
    use sinclair_ula::{ScreenRenderer, TactTable, TimingParams};
    use std::cell::RefCell;
    use std::rc::Rc;

    const RW: PortAccess = PortAccess::READ.union(PortAccess::WRITE);

    struct Bus {
        memory: MemoryPagingDevice,
        screen: ScreenRenderer,
        input: InputState,
        peripherals: Peripherals,
    }

    impl Bus {
        fn new() -> Self {
            let tacts = TactTable::from_params(TimingParams::spectrum_48k()).unwrap();
            Self {
                memory: MemoryPagingDevice::new(MemoryLayout::spectrum_48k(), vec![vec![0; BANK_SIZE]]),
                screen: ScreenRenderer::new(tacts, 3_500_000),
                input: InputState::new(),
                peripherals: Peripherals::new(),
            }
        }

        fn ctx(&mut self) -> PortContext<'_> {
            PortContext {
                memory: &mut self.memory,
                screen: &mut self.screen,
                input: &self.input,
                peripherals: &mut self.peripherals,
                frame_tact: 0,
            }
        }
    }

    fn latch(mask: u16, value: u16, read: u8) -> PortHandler {
        PortHandler::new(
            PortDescriptor::new(mask, value, RW),
            PortDevice::Latch(LatchPort::reading(0, read)),
        )
    }

    fn latch_value(map: &PortDispatcher, index: usize) -> u8 {
        match map.handlers()[index].device() {
            PortDevice::Latch(l) => l.value(),
            other => panic!("handler {index} is {other:?}"),
        }
    }

    #[test]
    fn first_registered_handler_wins_every_read() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        builder.add(latch(0x00FF, 0x00FE, 0x11));
        builder.add(latch(0x0001, 0x0000, 0x22));
        let mut map = builder.build();
        assert_eq!(map.overlaps(), vec![(0, 1)]);

        let mut bus = Bus::new();
        for _ in 0..3 {
            assert_eq!(map.read(0x00FE, &mut bus.ctx()), 0x11);
        }
        assert_eq!(map.read(0x00FC, &mut bus.ctx()), 0x22, "only the wide mask claims $FC");
    }

    #[test]
    fn first_registered_handler_wins_writes() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        builder.add(latch(0x00FF, 0x00FE, 0));
        builder.add(latch(0x0001, 0x0000, 0));
        let mut map = builder.build();

        let mut bus = Bus::new();
        map.write(0x00FE, 0x42, &mut bus.ctx());
        assert_eq!(latch_value(&map, 0), 0x42);
        assert_eq!(latch_value(&map, 1), 0, "shadowed handler never sees the write");
    }

    #[test]
    fn capability_filters_the_match() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        builder.add(PortHandler::new(
            PortDescriptor::new(0x00FF, 0x00FE, PortAccess::WRITE),
            PortDevice::Latch(LatchPort::reading(0, 0x11)),
        ));
        builder.add(latch(0x00FF, 0x00FE, 0x22));
        let mut map = builder.build();
        assert_eq!(map.overlaps(), vec![(0, 1)], "write-only and read-write share writes");

        let mut bus = Bus::new();
        assert_eq!(map.read(0x00FE, &mut bus.ctx()), 0x22, "write-only handler is skipped");
    }

    #[test]
    fn unclaimed_read_returns_idle_value() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xEE));
        builder.add(latch(0x00FF, 0x00FE, 0x11));
        let mut map = builder.build();

        let mut bus = Bus::new();
        assert_eq!(map.read(0x00FF, &mut bus.ctx()), 0xEE);
        map.write(0x00FF, 0x42, &mut bus.ctx());
        assert_eq!(latch_value(&map, 0), 0, "unclaimed write goes nowhere");
    }

    struct Registers(Rc<RefCell<Vec<(u8, u8)>>>);

    impl RegisterBank for Registers {
        fn read(&mut self, _index: u8) -> u8 {
            0
        }

        fn write(&mut self, index: u8, value: u8) {
            self.0.borrow_mut().push((index, value));
        }
    }

    #[test]
    fn notices_reach_linked_handlers_only() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        let select = builder.add(PortHandler::new(
            PortDescriptor::new(0xC002, 0xC000, RW),
            PortDevice::SoundSelect(SoundRegisterSelect::new()),
        ));
        let linked = builder.add(PortHandler::new(
            PortDescriptor::new(0xC002, 0x8000, PortAccess::WRITE),
            PortDevice::SoundData(SoundRegisterData::new()),
        ));
        builder.add(PortHandler::new(
            PortDescriptor::new(0xC002, 0x4000, PortAccess::WRITE),
            PortDevice::SoundData(SoundRegisterData::new()),
        ));
        builder.link(select, linked);
        let mut map = builder.build();

        let writes = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Bus::new();
        bus.peripherals.attach_sound(Box::new(Registers(Rc::clone(&writes))));

        map.write(0xFFFD, 0x07, &mut bus.ctx());
        map.write(0xBFFD, 0x3F, &mut bus.ctx());
        map.write(0x7FFD, 0x01, &mut bus.ctx());
        assert_eq!(*writes.borrow(), vec![(7, 0x3F), (0, 0x01)]);
    }

    #[test]
    fn restore_rejects_a_different_port_map() {
        let mut builder = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        builder.add(latch(0x00FF, 0x00FE, 0));
        let mut map = builder.build();

        let mut other = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
        other.add(PortHandler::new(
            PortDescriptor::new(0xC002, 0xC000, RW),
            PortDevice::SoundSelect(SoundRegisterSelect::new()),
        ));
        let blob = other.build().get_state();
        assert!(matches!(
            map.restore_state(&blob),
            Err(SnapshotError::Layout(_))
        ));
    }
}
