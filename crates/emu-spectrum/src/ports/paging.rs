//! Paging registers.
//!
//! $7FFD (128K and later):
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 0-2 | RAM bank at $C000 |
//! | 3 | Shadow screen (bank 7) |
//! | 4 | ROM select, low bit |
//! | 5 | Lock paging until reset |
//!
//! $1FFD (+3 and Next):
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 0 | All-RAM mode |
//! | 1-2 | All-RAM configuration; bit 2 is also the ROM high bit |
//! | 3 | Disk motor |
//! | 4 | Printer strobe |
//!
//! $DFFD (Next) supplies bank bits 3-5 for $7FFD.
//!
//! The ROM index is split between $7FFD and $1FFD. Each register caches the
//! other's last contribution, learned through [`PortNotice`]s, so a write to
//! either re-pages immediately. All three ignore writes once paging is locked.

use serde::{Deserialize, Serialize};

use super::{HostContext, PortContext, PortNotice};

/// 16K banks for slots 0-3 in each all-RAM configuration.
const SPECIAL_CONFIGS: [[usize; 4]; 4] = [[0, 1, 2, 3], [4, 5, 6, 7], [4, 5, 6, 3], [4, 7, 6, 3]];

/// Page in ROM `rom`, or leave the current one if the machine has no such ROM.
fn select_rom(ctx: &mut PortContext<'_>, rom: u8) {
    let rom = usize::from(rom);
    if rom < ctx.memory.layout().rom_count {
        ctx.memory.select_rom(rom);
    } else {
        log::warn!("paging selects missing ROM {rom}; ROM unchanged");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging7ffd {
    last: u8,
    rom_high: u8,
    special: bool,
    bank_high: u8,
    #[serde(skip)]
    ram_banks: usize,
}

impl Paging7ffd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last byte accepted.
    #[must_use]
    pub fn last(&self) -> u8 {
        self.last
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) -> Option<PortNotice> {
        if !ctx.memory.paging_enabled() {
            log::trace!("$7FFD write {value:#04X} ignored: paging locked");
            return None;
        }
        self.last = value;
        let bank = self.bank();
        let rom_low = (value >> 4) & 1;

        if !self.special {
            self.page_slot_3(ctx);
            select_rom(ctx, self.rom_high | rom_low);
        }
        ctx.memory.set_shadow_screen(value & 0x08 != 0);
        if value & 0x20 != 0 {
            log::debug!("paging locked by $7FFD write {value:#04X}");
            ctx.memory.lock_paging();
        }
        Some(PortNotice::RomLow { bit: rom_low, bank })
    }

    pub(super) fn rom_high_changed(&mut self, bit: u8, special: bool) {
        self.rom_high = bit & 0x02;
        self.special = special;
    }

    pub(super) fn bank_high_changed(&mut self, bits: u8, ctx: &mut PortContext<'_>) {
        self.bank_high = bits & 0x07;
        if ctx.memory.paging_enabled() && !self.special {
            self.page_slot_3(ctx);
        }
    }

    fn bank(&self) -> u8 {
        (self.last & 0x07) | ((self.bank_high & 0x07) << 3)
    }

    fn page_slot_3(&self, ctx: &mut PortContext<'_>) {
        let bank = usize::from(self.bank());
        if bank < self.ram_banks {
            ctx.memory.page_in_bank(3, bank);
        } else {
            log::warn!("$7FFD selects missing bank {bank}; slot 3 unchanged");
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self {
            ram_banks: self.ram_banks,
            ..Self::default()
        };
    }

    pub(super) fn attach(&mut self, host: &HostContext) {
        self.ram_banks = host.ram_banks;
    }

    pub(super) fn keep_binding(&mut self, bound: &Self) {
        self.ram_banks = bound.ram_banks;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging1ffd {
    last: u8,
    rom_low: u8,
    /// Bank bits 0-2 from $7FFD.
    bank: u8,
    /// Bank bits 3-5 from $DFFD.
    #[serde(default)]
    bank_high: u8,
}

impl Paging1ffd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last byte accepted.
    #[must_use]
    pub fn last(&self) -> u8 {
        self.last
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) -> Option<PortNotice> {
        if !ctx.memory.paging_enabled() {
            log::trace!("$1FFD write {value:#04X} ignored: paging locked");
            return None;
        }
        self.last = value;
        let special = value & 0x01 != 0;
        let rom_high = (value >> 1) & 0x02;

        if special {
            let config = SPECIAL_CONFIGS[usize::from((value >> 1) & 0x03)];
            for (slot, bank) in config.into_iter().enumerate() {
                ctx.memory.page_in_bank(slot, bank);
            }
        } else {
            ctx.memory.page_in_rom_bank(0);
            ctx.memory.page_in_bank(1, 5);
            ctx.memory.page_in_bank(2, 2);
            let bank = usize::from(self.bank());
            if bank < ctx.memory.layout().ram_banks() {
                ctx.memory.page_in_bank(3, bank);
            }
            select_rom(ctx, rom_high | (self.rom_low & 0x01));
        }
        ctx.peripherals.set_disk_motor(value & 0x08 != 0);
        ctx.peripherals.set_printer_strobe(value & 0x10 != 0);
        Some(PortNotice::RomHigh {
            bit: rom_high,
            special,
        })
    }

    pub(super) fn rom_low_changed(&mut self, bit: u8, bank: u8) {
        self.rom_low = bit & 0x01;
        self.bank = bank & 0x07;
    }

    pub(super) fn bank_high_changed(&mut self, bits: u8) {
        self.bank_high = bits & 0x07;
    }

    fn bank(&self) -> u8 {
        (self.bank & 0x07) | ((self.bank_high & 0x07) << 3)
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankExtension {
    last: u8,
}

impl BankExtension {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) -> Option<PortNotice> {
        if !ctx.memory.paging_enabled() {
            log::trace!("$DFFD write {value:#04X} ignored: paging locked");
            return None;
        }
        self.last = value;
        Some(PortNotice::BankHigh(value & 0x07))
    }

    pub(super) fn reset(&mut self) {
        self.last = 0;
    }
}
