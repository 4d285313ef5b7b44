//! I/O port handlers.
//!
//! A handler claims the port addresses for which `address & mask == value`
//! and says whether it answers reads, writes or both. Handlers are plain
//! data tagged by [`PortDevice`]; the dispatcher checks capability flags and
//! calls into the matching variant.
//!
//! Handlers that must cooperate (the two halves of the +3 ROM selection, an
//! index register and its data register) do not see each other. A write may
//! return a [`PortNotice`], which the dispatcher delivers to the handlers
//! linked to the writer when the port map was assembled.

mod dispatch;
mod floating;
mod indexed;
mod paging;
mod passthrough;
mod ula;
pub mod variants;

use std::mem;
use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use sinclair_ula::{ScreenRenderer, TactTable};

use crate::config::UlaIssue;
use crate::input::InputState;
use crate::memory::MemoryPagingDevice;
use crate::peripherals::{Peripherals, StorageRegister};

pub(crate) use dispatch::DispatcherState;
pub use dispatch::{HandlerId, PortDispatcher, PortMapBuilder, UnhandledRead};
pub use floating::FloatingBus;
pub use indexed::{NextRegisterData, NextRegisterSelect, SoundRegisterData, SoundRegisterSelect};
pub use paging::{BankExtension, Paging1ffd, Paging7ffd};
pub use passthrough::LatchPort;
pub use ula::UlaPort;

bitflags! {
    /// Directions a handler answers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortAccess: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// Which addresses a handler claims, and in which directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDescriptor {
    pub mask: u16,
    pub value: u16,
    pub access: PortAccess,
}

impl PortDescriptor {
    #[must_use]
    pub const fn new(mask: u16, value: u16, access: PortAccess) -> Self {
        Self {
            mask,
            value,
            access,
        }
    }

    #[must_use]
    pub fn matches(&self, address: u16) -> bool {
        address & self.mask == self.value
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.access.contains(PortAccess::READ)
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.access.contains(PortAccess::WRITE)
    }

    /// Whether some address is claimed by both descriptors in a shared
    /// direction.
    #[must_use]
    pub fn overlaps(&self, other: &PortDescriptor) -> bool {
        self.access.intersects(other.access)
            && (self.value ^ other.value) & self.mask & other.mask == 0
    }
}

/// A change published by a handler's write to the handlers linked to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortNotice {
    /// $7FFD: new ROM low bit and the full bank now selected for $C000.
    RomLow { bit: u8, bank: u8 },
    /// $1FFD: new ROM high bit (0 or 2) and whether all-RAM mode is on.
    RomHigh { bit: u8, special: bool },
    /// An index register selected a new register.
    RegisterIndex(u8),
    /// $DFFD: extra bank bits for $7FFD.
    BankHigh(u8),
}

/// Everything a handler may touch during one port access.
pub struct PortContext<'a> {
    pub memory: &'a mut MemoryPagingDevice,
    pub screen: &'a mut ScreenRenderer,
    pub input: &'a InputState,
    pub peripherals: &'a mut Peripherals,
    /// Current cycle within the frame.
    pub frame_tact: u32,
}

/// Machine facts handlers bind to once, when the port map is attached.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub tacts: Rc<TactTable>,
    pub ula_issue: UlaIssue,
    /// RAM size in pages of the memory layout's page size.
    pub ram_pages: usize,
    /// RAM size in 16K banks.
    pub ram_banks: usize,
}

/// The handler families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PortDevice {
    Ula(UlaPort),
    /// Reads the joystick state from the host input.
    Kempston,
    Latch(LatchPort),
    /// Forwards to a storage peripheral register.
    Storage(StorageRegister),
    FloatingBus(FloatingBus),
    Paging7ffd(Paging7ffd),
    Paging1ffd(Paging1ffd),
    BankExtension(BankExtension),
    SoundSelect(SoundRegisterSelect),
    SoundData(SoundRegisterData),
    NextSelect(NextRegisterSelect),
    NextData(NextRegisterData),
}

/// A port handler: what it claims plus the device behind it.
#[derive(Debug, Clone)]
pub struct PortHandler {
    descriptor: PortDescriptor,
    device: PortDevice,
}

impl PortHandler {
    #[must_use]
    pub fn new(descriptor: PortDescriptor, device: PortDevice) -> Self {
        Self { descriptor, device }
    }

    #[must_use]
    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn device(&self) -> &PortDevice {
        &self.device
    }

    pub(crate) fn read(&mut self, address: u16, ctx: &mut PortContext<'_>) -> u8 {
        match &mut self.device {
            PortDevice::Ula(d) => d.read(address, ctx),
            PortDevice::Kempston => ctx.input.kempston(),
            PortDevice::Latch(d) => d.read(),
            PortDevice::Storage(r) => ctx.peripherals.storage_read(*r),
            PortDevice::FloatingBus(d) => d.read(ctx),
            PortDevice::SoundSelect(d) => d.read(ctx),
            PortDevice::NextSelect(d) => d.read(),
            PortDevice::NextData(d) => d.read(ctx),
            PortDevice::Paging7ffd(_)
            | PortDevice::Paging1ffd(_)
            | PortDevice::BankExtension(_)
            | PortDevice::SoundData(_) => 0xFF,
        }
    }

    pub(crate) fn write(
        &mut self,
        value: u8,
        ctx: &mut PortContext<'_>,
    ) -> Option<PortNotice> {
        match &mut self.device {
            PortDevice::Ula(d) => d.write(value, ctx),
            PortDevice::Latch(d) => d.write(value),
            PortDevice::Storage(r) => ctx.peripherals.storage_write(*r, value),
            PortDevice::Paging7ffd(d) => return d.write(value, ctx),
            PortDevice::Paging1ffd(d) => return d.write(value, ctx),
            PortDevice::BankExtension(d) => return d.write(value, ctx),
            PortDevice::SoundSelect(d) => return Some(d.write(value)),
            PortDevice::SoundData(d) => d.write(value, ctx),
            PortDevice::NextSelect(d) => return Some(d.write(value)),
            PortDevice::NextData(d) => d.write(value, ctx),
            PortDevice::Kempston | PortDevice::FloatingBus(_) => {}
        }
        None
    }

    pub(crate) fn notify(&mut self, notice: PortNotice, ctx: &mut PortContext<'_>) {
        match (&mut self.device, notice) {
            (PortDevice::Paging7ffd(d), PortNotice::RomHigh { bit, special }) => {
                d.rom_high_changed(bit, special);
            }
            (PortDevice::Paging7ffd(d), PortNotice::BankHigh(bits)) => d.bank_high_changed(bits, ctx),
            (PortDevice::Paging1ffd(d), PortNotice::RomLow { bit, bank }) => {
                d.rom_low_changed(bit, bank);
            }
            (PortDevice::Paging1ffd(d), PortNotice::BankHigh(bits)) => d.bank_high_changed(bits),
            (PortDevice::SoundData(d), PortNotice::RegisterIndex(i)) => d.select(i),
            (PortDevice::NextData(d), PortNotice::RegisterIndex(i)) => d.select(i),
            (_, notice) => log::trace!("{notice:?} has no effect on {:?}", self.descriptor),
        }
    }

    /// Restore power-on defaults.
    pub fn reset(&mut self) {
        match &mut self.device {
            PortDevice::Ula(d) => d.reset(),
            PortDevice::Latch(d) => d.reset(),
            PortDevice::Paging7ffd(d) => d.reset(),
            PortDevice::Paging1ffd(d) => d.reset(),
            PortDevice::BankExtension(d) => d.reset(),
            PortDevice::SoundSelect(d) => d.reset(),
            PortDevice::SoundData(d) => d.reset(),
            PortDevice::NextSelect(d) => d.reset(),
            PortDevice::NextData(d) => d.reset(),
            PortDevice::Kempston | PortDevice::Storage(_) | PortDevice::FloatingBus(_) => {}
        }
    }

    /// Bind to the machine facts this handler needs.
    pub fn on_attached(&mut self, host: &HostContext) {
        match &mut self.device {
            PortDevice::Ula(d) => d.attach(host),
            PortDevice::FloatingBus(d) => d.attach(host),
            PortDevice::Paging7ffd(d) => d.attach(host),
            PortDevice::NextData(d) => d.attach(host),
            _ => {}
        }
    }

    /// Take runtime state from `saved`, keeping what was bound at attach
    /// time. Returns `false`, changing nothing, if `saved` is a different
    /// kind of device.
    pub(crate) fn restore_device(&mut self, mut saved: PortDevice) -> bool {
        if mem::discriminant(&self.device) != mem::discriminant(&saved) {
            return false;
        }
        match (&self.device, &mut saved) {
            (PortDevice::Ula(cur), PortDevice::Ula(new)) => new.keep_binding(cur),
            (PortDevice::FloatingBus(cur), PortDevice::FloatingBus(new)) => new.keep_binding(cur),
            (PortDevice::Paging7ffd(cur), PortDevice::Paging7ffd(new)) => new.keep_binding(cur),
            (PortDevice::NextData(cur), PortDevice::NextData(new)) => new.keep_binding(cur),
            _ => {}
        }
        self.device = saved;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RW: PortAccess = PortAccess::READ.union(PortAccess::WRITE);

    #[test]
    fn descriptor_matching() {
        let d = PortDescriptor::new(0x8002, 0x0000, PortAccess::WRITE);
        assert!(d.matches(0x7FFD));
        assert!(!d.matches(0xFFFD));
        assert!(!d.matches(0x7FFF));
        assert!(d.can_write());
        assert!(!d.can_read());
    }

    #[test]
    fn overlap_needs_shared_address_and_direction() {
        let ula = PortDescriptor::new(0x0001, 0x0000, RW);
        let floating = PortDescriptor::new(0x8002, 0x0000, PortAccess::READ);
        let kempston = PortDescriptor::new(0x00FF, 0x001F, PortAccess::READ);
        let paging = PortDescriptor::new(0x8002, 0x0000, PortAccess::WRITE);
        assert!(ula.overlaps(&floating), "$0000 matches both for reads");
        assert!(!ula.overlaps(&kempston), "even vs odd");
        assert!(!floating.overlaps(&paging), "same addresses, opposite directions");
    }
}
