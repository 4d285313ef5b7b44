//! Index/data register pairs.
//!
//! One port selects a register, a second port reads or writes it. The select
//! handler publishes the new index; the data handler keeps its own copy.
//!
//! The AY pair ($FFFD select, $BFFD data) forwards to an external sound chip.
//! The Next pair ($243B select, $253B data) owns the Next register file; the
//! MMU registers $50-$57 page RAM into the eight 8K slots.

use serde::{Deserialize, Serialize};

use super::{HostContext, PortContext, PortNotice};
use crate::memory::SlotSource;

/// First MMU register; $50-$57 cover slots 0-7.
const MMU_FIRST: u8 = 0x50;
const MMU_LAST: u8 = 0x57;

/// MMU value that restores ROM to slot 0 or 1.
const MMU_ROM: u8 = 0xFF;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundRegisterSelect {
    index: u8,
}

impl SoundRegisterSelect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn index(&self) -> u8 {
        self.index
    }

    pub(super) fn read(&self, ctx: &mut PortContext<'_>) -> u8 {
        ctx.peripherals.sound_read(self.index)
    }

    pub(super) fn write(&mut self, value: u8) -> PortNotice {
        self.index = value & 0x0F;
        PortNotice::RegisterIndex(self.index)
    }

    pub(super) fn reset(&mut self) {
        self.index = 0;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundRegisterData {
    index: u8,
}

impl SoundRegisterData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn select(&mut self, index: u8) {
        self.index = index;
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) {
        ctx.peripherals.sound_write(self.index, value);
    }

    pub(super) fn reset(&mut self) {
        self.index = 0;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextRegisterSelect {
    index: u8,
}

impl NextRegisterSelect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn read(&self) -> u8 {
        self.index
    }

    pub(super) fn write(&mut self, value: u8) -> PortNotice {
        self.index = value;
        PortNotice::RegisterIndex(value)
    }

    pub(super) fn reset(&mut self) {
        self.index = 0;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRegisterData {
    index: u8,
    registers: Vec<u8>,
    #[serde(skip)]
    ram_pages: usize,
}

impl Default for NextRegisterData {
    fn default() -> Self {
        Self {
            index: 0,
            registers: vec![0; 256],
            ram_pages: 0,
        }
    }
}

impl NextRegisterData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value of register `index`. MMU registers read their live
    /// mapping through the port instead.
    #[must_use]
    pub fn register(&self, index: u8) -> u8 {
        self.registers[usize::from(index)]
    }

    pub(super) fn select(&mut self, index: u8) {
        self.index = index;
    }

    pub(super) fn read(&self, ctx: &mut PortContext<'_>) -> u8 {
        match self.index {
            MMU_FIRST..=MMU_LAST => {
                match ctx.memory.slot(usize::from(self.index - MMU_FIRST)) {
                    SlotSource::Rom => MMU_ROM,
                    SlotSource::Ram(page) => page as u8,
                }
            }
            i => self.registers[usize::from(i)],
        }
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) {
        self.registers[usize::from(self.index)] = value;
        if let MMU_FIRST..=MMU_LAST = self.index {
            let slot = usize::from(self.index - MMU_FIRST);
            if value == MMU_ROM && slot < 2 {
                ctx.memory.page_in_rom(slot);
            } else if usize::from(value) < self.ram_pages {
                ctx.memory.page_in(slot, usize::from(value));
            } else {
                log::warn!("MMU{slot} write {value:#04X}: no such RAM page, slot unchanged");
            }
        }
    }

    pub(super) fn reset(&mut self) {
        self.index = 0;
        self.registers.fill(0);
    }

    pub(super) fn attach(&mut self, host: &HostContext) {
        self.ram_pages = host.ram_pages;
    }

    pub(super) fn keep_binding(&mut self, bound: &Self) {
        self.ram_pages = bound.ram_pages;
        self.registers.resize(256, 0);
    }
}
