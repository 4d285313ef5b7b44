//! Banked memory.
//!
//! The CPU sees 64K split into equal slots (four of 16K, or eight of 8K on
//! the Next). Each slot shows either the selected ROM or one RAM page. The
//! ULA reads the screen from a fixed RAM bank regardless of what the CPU has
//! paged in, switching to the shadow bank when the shadow screen is on.
//!
//! Paging calls with an out-of-range slot, page or ROM index are programming
//! errors and panic; guest-supplied values are range-checked by the port
//! handlers before they get here.

use emu_core::{Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};

use crate::codec;

/// Size of a ROM image and of a 16K bank.
pub const BANK_SIZE: usize = 0x4000;

const STATE_VERSION: u16 = 1;

/// What a slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotSource {
    /// The matching part of the selected ROM.
    Rom,
    /// A RAM page, in units of the layout's page size.
    Ram(u16),
}

/// Which 16K RAM banks the ULA contends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContendedBanks {
    /// One bank (the 48K's lower 16K).
    Single(u16),
    /// Banks 1, 3, 5, 7 (128K, +2).
    Odd,
    /// Banks 4-7 (+2A/+3 gate array, Next).
    Upper,
}

impl ContendedBanks {
    fn contains(self, bank: u16) -> bool {
        match self {
            Self::Single(b) => bank == b,
            Self::Odd => bank & 1 == 1,
            Self::Upper => (4..=7).contains(&bank),
        }
    }
}

/// Fixed shape of a model's memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Slot and RAM page size in bytes: 0x4000 or 0x2000.
    pub page_size: usize,
    /// Number of 16K ROM images.
    pub rom_count: usize,
    /// Number of RAM pages of `page_size`.
    pub ram_pages: usize,
    /// Slot mapping after reset.
    pub default_slots: Vec<SlotSource>,
    /// 16K bank the ULA displays normally.
    pub screen_bank: u16,
    /// 16K bank the ULA displays when the shadow screen is selected.
    pub shadow_screen_bank: u16,
    pub contended: ContendedBanks,
}

impl MemoryLayout {
    /// 16K ROM, 48K RAM as three 16K banks. Bank 0 at $4000 is the screen.
    #[must_use]
    pub fn spectrum_48k() -> Self {
        Self {
            page_size: BANK_SIZE,
            rom_count: 1,
            ram_pages: 3,
            default_slots: vec![
                SlotSource::Rom,
                SlotSource::Ram(0),
                SlotSource::Ram(1),
                SlotSource::Ram(2),
            ],
            screen_bank: 0,
            shadow_screen_bank: 0,
            contended: ContendedBanks::Single(0),
        }
    }

    /// Two ROMs, eight 16K banks. Banks 5 and 2 are fixed at $4000 and
    /// $8000; $C000 is switchable.
    #[must_use]
    pub fn spectrum_128k() -> Self {
        Self {
            page_size: BANK_SIZE,
            rom_count: 2,
            ram_pages: 8,
            default_slots: vec![
                SlotSource::Rom,
                SlotSource::Ram(5),
                SlotSource::Ram(2),
                SlotSource::Ram(0),
            ],
            screen_bank: 5,
            shadow_screen_bank: 7,
            contended: ContendedBanks::Odd,
        }
    }

    /// As the 128K but with four ROMs and the gate array's contention.
    #[must_use]
    pub fn spectrum_plus3() -> Self {
        Self {
            rom_count: 4,
            contended: ContendedBanks::Upper,
            ..Self::spectrum_128k()
        }
    }

    /// 8K slots over 768K of RAM, with the +3 ROMs.
    #[must_use]
    pub fn spectrum_next() -> Self {
        Self {
            page_size: 0x2000,
            rom_count: 4,
            ram_pages: 96,
            default_slots: vec![
                SlotSource::Rom,
                SlotSource::Rom,
                SlotSource::Ram(10),
                SlotSource::Ram(11),
                SlotSource::Ram(4),
                SlotSource::Ram(5),
                SlotSource::Ram(0),
                SlotSource::Ram(1),
            ],
            screen_bank: 5,
            shadow_screen_bank: 7,
            contended: ContendedBanks::Upper,
        }
    }

    /// Number of CPU-visible slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        0x10000 / self.page_size
    }

    /// Slots per 16K bank: 1 or 2.
    fn pages_per_bank(&self) -> usize {
        BANK_SIZE / self.page_size
    }

    /// Number of 16K RAM banks.
    #[must_use]
    pub fn ram_banks(&self) -> usize {
        self.ram_pages / self.pages_per_bank()
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct MemoryState {
    version: u16,
    paging_enabled: bool,
    slots: Vec<SlotSource>,
    selected_rom: usize,
    shadow_screen: bool,
    last_contended_value: u8,
    ram: Vec<u8>,
}

/// ROM and RAM behind the CPU's slots.
pub struct MemoryPagingDevice {
    layout: MemoryLayout,
    roms: Vec<Vec<u8>>,
    ram: Vec<u8>,
    slots: Vec<SlotSource>,
    selected_rom: usize,
    shadow_screen: bool,
    paging_enabled: bool,
    last_contended_value: u8,
}

impl MemoryPagingDevice {
    /// Create memory for `layout` holding `roms`.
    ///
    /// # Panics
    ///
    /// Panics if the number of ROM images does not match the layout, if any
    /// image is not exactly 16,384 bytes, or if the layout's default slots
    /// are malformed.
    #[must_use]
    pub fn new(layout: MemoryLayout, roms: Vec<Vec<u8>>) -> Self {
        assert!(
            roms.len() == layout.rom_count,
            "layout needs {} ROM images, got {}",
            layout.rom_count,
            roms.len()
        );
        for (i, rom) in roms.iter().enumerate() {
            assert!(
                rom.len() == BANK_SIZE,
                "ROM {i} must be exactly 16384 bytes, got {}",
                rom.len()
            );
        }
        assert!(
            layout.default_slots.len() == layout.slot_count(),
            "layout has {} default slots for {} slots",
            layout.default_slots.len(),
            layout.slot_count()
        );

        let mut memory = Self {
            ram: vec![0; layout.ram_pages * layout.page_size],
            slots: layout.default_slots.clone(),
            selected_rom: 0,
            shadow_screen: false,
            paging_enabled: true,
            last_contended_value: 0xFF,
            roms,
            layout,
        };
        for slot in 0..memory.slots.len() {
            if let SlotSource::Ram(page) = memory.slots[slot] {
                memory.page_in(slot, usize::from(page));
            }
        }
        memory
    }

    #[must_use]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// CPU read. A contended read latches the byte as the last value seen on
    /// the ULA's side of the bus.
    pub fn read(&mut self, addr: u16, contended: bool) -> u8 {
        let value = self.peek(addr);
        if contended {
            self.last_contended_value = value;
        }
        value
    }

    /// CPU write. Writes to ROM slots are ignored, but still latch when
    /// contended.
    pub fn write(&mut self, addr: u16, value: u8, contended: bool) {
        if contended {
            self.last_contended_value = value;
        }
        let (slot, offset) = self.split(addr);
        if let SlotSource::Ram(page) = self.slots[slot] {
            self.ram[usize::from(page) * self.layout.page_size + offset] = value;
        }
    }

    /// Read without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        let (slot, offset) = self.split(addr);
        match self.slots[slot] {
            SlotSource::Rom => {
                let rom_offset = (slot * self.layout.page_size + offset) % BANK_SIZE;
                self.roms[self.selected_rom][rom_offset]
            }
            SlotSource::Ram(page) => self.ram[usize::from(page) * self.layout.page_size + offset],
        }
    }

    /// Read display memory as the ULA sees it.
    ///
    /// `addr` is a CPU-style display address ($4000-$5AFF); only its low 14
    /// bits are used, against the screen or shadow-screen bank.
    #[must_use]
    pub fn read_screen(&self, addr: u16) -> u8 {
        let bank = if self.shadow_screen {
            self.layout.shadow_screen_bank
        } else {
            self.layout.screen_bank
        };
        self.ram[usize::from(bank) * BANK_SIZE + usize::from(addr & 0x3FFF)]
    }

    /// Whether a CPU access to `addr` competes with the ULA.
    #[must_use]
    pub fn is_contended(&self, addr: u16) -> bool {
        let (slot, _) = self.split(addr);
        match self.slots[slot] {
            SlotSource::Rom => false,
            SlotSource::Ram(page) => self
                .layout
                .contended
                .contains(page / self.layout.pages_per_bank() as u16),
        }
    }

    /// Map RAM `page` (in page-size units) into `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `page` is out of range.
    pub fn page_in(&mut self, slot: usize, page: usize) {
        assert!(
            slot < self.slots.len(),
            "slot {slot} out of range (0-{})",
            self.slots.len() - 1
        );
        assert!(
            page < self.layout.ram_pages,
            "RAM page {page} out of range (0-{})",
            self.layout.ram_pages - 1
        );
        self.slots[slot] = SlotSource::Ram(page as u16);
    }

    /// Map 16K `bank` into 16K slot `slot16` (0-3), whatever the page size.
    pub fn page_in_bank(&mut self, slot16: usize, bank: usize) {
        let per = self.layout.pages_per_bank();
        for i in 0..per {
            self.page_in(slot16 * per + i, bank * per + i);
        }
    }

    /// Show the selected ROM in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn page_in_rom(&mut self, slot: usize) {
        assert!(
            slot < self.slots.len(),
            "slot {slot} out of range (0-{})",
            self.slots.len() - 1
        );
        self.slots[slot] = SlotSource::Rom;
    }

    /// Show the selected ROM in 16K slot `slot16`, whatever the page size.
    pub fn page_in_rom_bank(&mut self, slot16: usize) {
        let per = self.layout.pages_per_bank();
        for i in 0..per {
            self.page_in_rom(slot16 * per + i);
        }
    }

    /// Select which ROM image ROM slots show.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the layout's ROM count.
    pub fn select_rom(&mut self, index: usize) {
        assert!(
            index < self.layout.rom_count,
            "ROM {index} out of range (0-{})",
            self.layout.rom_count - 1
        );
        self.selected_rom = index;
    }

    #[must_use]
    pub fn selected_rom(&self) -> usize {
        self.selected_rom
    }

    #[must_use]
    pub fn slot(&self, slot: usize) -> SlotSource {
        self.slots[slot]
    }

    #[must_use]
    pub fn slots(&self) -> &[SlotSource] {
        &self.slots
    }

    /// The 16K bank currently shown in 16K slot `slot16`, if RAM.
    #[must_use]
    pub fn bank_in(&self, slot16: usize) -> Option<usize> {
        match self.slots[slot16 * self.layout.pages_per_bank()] {
            SlotSource::Rom => None,
            SlotSource::Ram(page) => Some(usize::from(page) / self.layout.pages_per_bank()),
        }
    }

    pub fn set_shadow_screen(&mut self, on: bool) {
        self.shadow_screen = on;
    }

    #[must_use]
    pub fn shadow_screen(&self) -> bool {
        self.shadow_screen
    }

    /// Whether the paging ports still respond. Cleared by the lock bit until
    /// reset.
    #[must_use]
    pub fn paging_enabled(&self) -> bool {
        self.paging_enabled
    }

    pub fn lock_paging(&mut self) {
        self.paging_enabled = false;
    }

    /// The last byte a contended access put on the bus.
    #[must_use]
    pub fn last_contended_value(&self) -> u8 {
        self.last_contended_value
    }

    /// A whole 16K RAM bank.
    #[must_use]
    pub fn ram_bank(&self, bank: usize) -> &[u8] {
        &self.ram[bank * BANK_SIZE..(bank + 1) * BANK_SIZE]
    }

    pub fn ram_bank_mut(&mut self, bank: usize) -> &mut [u8] {
        &mut self.ram[bank * BANK_SIZE..(bank + 1) * BANK_SIZE]
    }

    /// Hardware reset: default slots, ROM 0, normal screen, paging unlocked.
    /// RAM contents survive.
    pub fn reset(&mut self) {
        self.slots.clone_from(&self.layout.default_slots);
        self.selected_rom = 0;
        self.shadow_screen = false;
        self.paging_enabled = true;
        self.last_contended_value = 0xFF;
    }

    fn split(&self, addr: u16) -> (usize, usize) {
        let addr = usize::from(addr);
        (addr / self.layout.page_size, addr % self.layout.page_size)
    }

    fn check_state(&self, state: &MemoryState) -> Result<(), SnapshotError> {
        codec::check_version(state.version, STATE_VERSION)?;
        if state.ram.len() != self.ram.len() {
            return Err(SnapshotError::Layout(format!(
                "{} bytes of RAM, expected {}",
                state.ram.len(),
                self.ram.len()
            )));
        }
        if state.slots.len() != self.slots.len() {
            return Err(SnapshotError::Layout(format!(
                "{} slots, expected {}",
                state.slots.len(),
                self.slots.len()
            )));
        }
        if state.selected_rom >= self.layout.rom_count {
            return Err(SnapshotError::Layout(format!(
                "ROM {} selected of {}",
                state.selected_rom, self.layout.rom_count
            )));
        }
        let bad_page = state.slots.iter().any(
            |s| matches!(s, SlotSource::Ram(p) if usize::from(*p) >= self.layout.ram_pages),
        );
        if bad_page {
            return Err(SnapshotError::Layout("slot maps a missing RAM page".into()));
        }
        Ok(())
    }

    pub(crate) fn save(&self) -> MemoryState {
        MemoryState {
            version: STATE_VERSION,
            paging_enabled: self.paging_enabled,
            slots: self.slots.clone(),
            selected_rom: self.selected_rom,
            shadow_screen: self.shadow_screen,
            last_contended_value: self.last_contended_value,
            ram: self.ram.clone(),
        }
    }

    /// Check `state` against this layout, then take it.
    pub(crate) fn load(&mut self, state: MemoryState) -> Result<(), SnapshotError> {
        self.check_state(&state)?;
        self.paging_enabled = state.paging_enabled;
        self.slots = state.slots;
        self.selected_rom = state.selected_rom;
        self.shadow_screen = state.shadow_screen;
        self.last_contended_value = state.last_contended_value;
        self.ram = state.ram;
        Ok(())
    }
}

impl Snapshot for MemoryPagingDevice {
    fn get_state(&self) -> Vec<u8> {
        codec::encode("memory", &self.save())
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError> {
        self.load(codec::decode(blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roms(count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![0xA0 + i as u8; BANK_SIZE]).collect()
    }

    fn memory_128k() -> MemoryPagingDevice {
        MemoryPagingDevice::new(MemoryLayout::spectrum_128k(), roms(2))
    }

    #[test]
    fn layout_48k() {
        let mut mem = MemoryPagingDevice::new(MemoryLayout::spectrum_48k(), roms(1));
        assert_eq!(mem.peek(0x0000), 0xA0);
        mem.write(0x4000, 0x12, true);
        mem.write(0xFFFF, 0x34, false);
        assert_eq!(mem.peek(0x4000), 0x12);
        assert_eq!(mem.peek(0xFFFF), 0x34);
        assert_eq!(mem.read_screen(0x4000), 0x12);
    }

    #[test]
    fn rom_writes_are_ignored() {
        let mut mem = memory_128k();
        mem.write(0x1234, 0x55, false);
        assert_eq!(mem.peek(0x1234), 0xA0);
    }

    #[test]
    fn contention_48k() {
        let mem = MemoryPagingDevice::new(MemoryLayout::spectrum_48k(), roms(1));
        assert!(!mem.is_contended(0x3FFF));
        assert!(mem.is_contended(0x4000));
        assert!(mem.is_contended(0x7FFF));
        assert!(!mem.is_contended(0x8000));
    }

    #[test]
    fn contention_128k_follows_odd_banks() {
        let mut mem = memory_128k();
        assert!(mem.is_contended(0x4000), "bank 5 at $4000");
        assert!(!mem.is_contended(0xC000), "bank 0 at $C000");
        mem.page_in(3, 3);
        assert!(mem.is_contended(0xC000), "bank 3 at $C000");
    }

    #[test]
    fn contention_plus3_follows_upper_banks() {
        let mut mem = MemoryPagingDevice::new(MemoryLayout::spectrum_plus3(), roms(4));
        mem.page_in(3, 3);
        assert!(!mem.is_contended(0xC000));
        mem.page_in(3, 6);
        assert!(mem.is_contended(0xC000));
    }

    #[test]
    fn paging_slot_3() {
        let mut mem = memory_128k();
        mem.write(0xC000, 0x11, false);
        mem.page_in(3, 1);
        mem.write(0xC000, 0x22, false);
        mem.page_in(3, 0);
        assert_eq!(mem.peek(0xC000), 0x11);
        assert_eq!(mem.ram_bank(1)[0], 0x22);
    }

    #[test]
    fn bank_5_is_shared_between_slot_1_and_slot_3() {
        let mut mem = memory_128k();
        mem.page_in(3, 5);
        mem.write(0xC010, 0x77, false);
        assert_eq!(mem.peek(0x4010), 0x77);
    }

    #[test]
    fn rom_selection() {
        let mut mem = memory_128k();
        mem.select_rom(1);
        assert_eq!(mem.peek(0x0000), 0xA1);
        assert_eq!(mem.selected_rom(), 1);
    }

    #[test]
    fn shadow_screen_reads_bank_7() {
        let mut mem = memory_128k();
        mem.ram_bank_mut(5)[0] = 0x05;
        mem.ram_bank_mut(7)[0] = 0x07;
        assert_eq!(mem.read_screen(0x4000), 0x05);
        mem.set_shadow_screen(true);
        assert_eq!(mem.read_screen(0x4000), 0x07);
        assert_eq!(mem.peek(0x4000), 0x05, "CPU view unaffected");
    }

    #[test]
    fn next_slots_are_8k() {
        let mut mem = MemoryPagingDevice::new(MemoryLayout::spectrum_next(), roms(4));
        assert_eq!(mem.slots().len(), 8);
        assert_eq!(mem.peek(0x2000), 0xA0, "upper half of ROM");
        mem.page_in(1, 20);
        mem.write(0x2000, 0x99, false);
        assert_eq!(mem.slot(1), SlotSource::Ram(20));
        mem.page_in_rom(1);
        assert_eq!(mem.peek(0x2000), 0xA0);
        mem.page_in(7, 20);
        assert_eq!(mem.peek(0xE000), 0x99);
        assert_eq!(mem.bank_in(1), Some(5));
    }

    #[test]
    fn page_in_bank_maps_both_8k_halves() {
        let mut mem = MemoryPagingDevice::new(MemoryLayout::spectrum_next(), roms(4));
        mem.page_in_bank(3, 7);
        assert_eq!(mem.slot(6), SlotSource::Ram(14));
        assert_eq!(mem.slot(7), SlotSource::Ram(15));
        assert_eq!(mem.bank_in(3), Some(7));
    }

    #[test]
    fn contended_accesses_latch_bus_value() {
        let mut mem = memory_128k();
        mem.write(0x8000, 0x42, false);
        mem.write(0x4000, 0x24, true);
        assert_eq!(mem.read(0x8000, false), 0x42);
        assert_eq!(mem.last_contended_value(), 0x24);
        mem.read(0x8000, true);
        assert_eq!(mem.last_contended_value(), 0x42);
    }

    #[test]
    fn lock_survives_until_reset() {
        let mut mem = memory_128k();
        mem.page_in(3, 4);
        mem.select_rom(1);
        mem.set_shadow_screen(true);
        mem.lock_paging();
        assert!(!mem.paging_enabled());
        mem.ram_bank_mut(2)[0] = 0xEE;
        mem.reset();
        assert!(mem.paging_enabled());
        assert_eq!(mem.slots(), MemoryLayout::spectrum_128k().default_slots);
        assert_eq!(mem.selected_rom(), 0);
        assert!(!mem.shadow_screen());
        assert_eq!(mem.ram_bank(2)[0], 0xEE, "RAM survives reset");
    }

    #[test]
    #[should_panic(expected = "RAM page 8 out of range")]
    fn page_in_rejects_missing_bank() {
        memory_128k().page_in(3, 8);
    }

    #[test]
    #[should_panic(expected = "slot 4 out of range")]
    fn page_in_rejects_missing_slot() {
        memory_128k().page_in(4, 0);
    }

    #[test]
    #[should_panic(expected = "ROM 2 out of range")]
    fn select_rom_rejects_missing_rom() {
        memory_128k().select_rom(2);
    }

    #[test]
    #[should_panic(expected = "ROM 0 must be exactly 16384 bytes, got 100")]
    fn new_rejects_short_rom() {
        let _ = MemoryPagingDevice::new(MemoryLayout::spectrum_48k(), vec![vec![0; 100]]);
    }

    #[test]
    fn state_round_trip() {
        let mut mem = memory_128k();
        mem.page_in(3, 6);
        mem.select_rom(1);
        mem.write(0xC123, 0x5A, false);
        mem.lock_paging();
        let blob = mem.get_state();

        let mut other = memory_128k();
        other.restore_state(&blob).unwrap();
        assert_eq!(other.slot(3), SlotSource::Ram(6));
        assert_eq!(other.selected_rom(), 1);
        assert_eq!(other.peek(0xC123), 0x5A);
        assert!(!other.paging_enabled());
    }

    #[test]
    fn restore_rejects_other_layout() {
        let blob = MemoryPagingDevice::new(MemoryLayout::spectrum_48k(), roms(1)).get_state();
        let mut mem = memory_128k();
        assert!(matches!(
            mem.restore_state(&blob),
            Err(SnapshotError::Layout(_))
        ));
        assert!(matches!(
            mem.restore_state(b"not json"),
            Err(SnapshotError::Malformed(_))
        ));
    }
}
