//! Port maps for each model.
//!
//! | Port | Decode (mask/value) | 48K | 128K | +3 | Next |
//! |------|---------------------|-----|------|----|------|
//! | ULA $FE | $0001/$0000 | rw | rw | rw | rw |
//! | Kempston $1F | $00FF/$001F | r* | r* | r* | r* |
//! | $7FFD | $8002/$0000 (128K), $C002/$4000 | | w | w | w |
//! | $1FFD | $F002/$1000 | | | w | w |
//! | $DFFD | $F002/$D000 | | | | w |
//! | AY $FFFD | $C002/$C000 | | rw | rw | rw |
//! | AY $BFFD | $C002/$8000 | | w | w | w |
//! | FDC $2FFD, $3FFD | $F002/$2000, $3000 | | | r, rw | |
//! | Printer $0FFD | $F002/$0000 | | | rw | |
//! | Next $243B, $253B | exact | | | | rw |
//! | DivIDE $E3, MMC $E7, $EB | $00FF | | | | rw |
//! | Timex $FF | $00FF/$00FF | | | | rw |
//!
//! `*` only when the joystick is enabled. The 48K and 128K fall back to the
//! floating bus for unclaimed reads; the +3 and Next read $FF. On the 128K a
//! read of $7FFD also returns the floating bus.

use super::{
    BankExtension, FloatingBus, LatchPort, NextRegisterData, NextRegisterSelect, Paging1ffd,
    Paging7ffd, PortAccess, PortDescriptor, PortDevice, PortDispatcher, PortHandler, PortMapBuilder,
    SoundRegisterData, SoundRegisterSelect, UlaPort, UnhandledRead,
};
use crate::config::SpectrumModel;
use crate::peripherals::StorageRegister;

const R: PortAccess = PortAccess::READ;
const W: PortAccess = PortAccess::WRITE;
const RW: PortAccess = PortAccess::READ.union(PortAccess::WRITE);

pub const ULA: PortDescriptor = PortDescriptor::new(0x0001, 0x0000, RW);
pub const KEMPSTON: PortDescriptor = PortDescriptor::new(0x00FF, 0x001F, R);
pub const PAGING_128K: PortDescriptor = PortDescriptor::new(0x8002, 0x0000, W);
pub const FLOATING_128K: PortDescriptor = PortDescriptor::new(0x8002, 0x0000, R);
pub const PAGING_PLUS3: PortDescriptor = PortDescriptor::new(0xC002, 0x4000, W);
pub const PAGING_1FFD: PortDescriptor = PortDescriptor::new(0xF002, 0x1000, W);
pub const BANK_EXTENSION: PortDescriptor = PortDescriptor::new(0xF002, 0xD000, W);
pub const AY_SELECT: PortDescriptor = PortDescriptor::new(0xC002, 0xC000, RW);
pub const AY_DATA: PortDescriptor = PortDescriptor::new(0xC002, 0x8000, W);
pub const FDC_STATUS: PortDescriptor = PortDescriptor::new(0xF002, 0x2000, R);
pub const FDC_DATA: PortDescriptor = PortDescriptor::new(0xF002, 0x3000, RW);
pub const PRINTER: PortDescriptor = PortDescriptor::new(0xF002, 0x0000, RW);
pub const NEXT_SELECT: PortDescriptor = PortDescriptor::new(0xFFFF, 0x243B, RW);
pub const NEXT_DATA: PortDescriptor = PortDescriptor::new(0xFFFF, 0x253B, RW);
pub const DIVIDE_CONTROL: PortDescriptor = PortDescriptor::new(0x00FF, 0x00E3, RW);
pub const MMC_CONTROL: PortDescriptor = PortDescriptor::new(0x00FF, 0x00E7, RW);
pub const MMC_DATA: PortDescriptor = PortDescriptor::new(0x00FF, 0x00EB, RW);
pub const TIMEX_SCREEN: PortDescriptor = PortDescriptor::new(0x00FF, 0x00FF, RW);

/// The port map for `model`, not yet attached to a machine.
#[must_use]
pub fn port_map(model: SpectrumModel, kempston: bool) -> PortDispatcher {
    match model {
        SpectrumModel::Spectrum48K => spectrum_48k(kempston),
        SpectrumModel::Spectrum128K => spectrum_128k(kempston),
        SpectrumModel::SpectrumPlus3 => spectrum_plus3(kempston),
        SpectrumModel::SpectrumNext => spectrum_next(kempston),
    }
}

fn common(map: &mut PortMapBuilder, kempston: bool) {
    map.add(PortHandler::new(ULA, PortDevice::Ula(UlaPort::new())));
    if kempston {
        map.add(PortHandler::new(KEMPSTON, PortDevice::Kempston));
    }
}

fn sound(map: &mut PortMapBuilder) {
    let select = map.add(PortHandler::new(
        AY_SELECT,
        PortDevice::SoundSelect(SoundRegisterSelect::new()),
    ));
    let data = map.add(PortHandler::new(
        AY_DATA,
        PortDevice::SoundData(SoundRegisterData::new()),
    ));
    map.link(select, data);
}

fn spectrum_48k(kempston: bool) -> PortDispatcher {
    let mut map = PortDispatcher::builder(UnhandledRead::FloatingBus(FloatingBus::new()));
    common(&mut map, kempston);
    map.build()
}

fn spectrum_128k(kempston: bool) -> PortDispatcher {
    let mut map = PortDispatcher::builder(UnhandledRead::FloatingBus(FloatingBus::new()));
    common(&mut map, kempston);
    map.add(PortHandler::new(
        PAGING_128K,
        PortDevice::Paging7ffd(Paging7ffd::new()),
    ));
    map.add(PortHandler::new(
        FLOATING_128K,
        PortDevice::FloatingBus(FloatingBus::new()),
    ));
    sound(&mut map);
    map.build()
}

/// $7FFD and $1FFD, each told about the other's writes.
fn split_rom_paging(map: &mut PortMapBuilder) {
    let low = map.add(PortHandler::new(
        PAGING_PLUS3,
        PortDevice::Paging7ffd(Paging7ffd::new()),
    ));
    let high = map.add(PortHandler::new(
        PAGING_1FFD,
        PortDevice::Paging1ffd(Paging1ffd::new()),
    ));
    map.link(low, high).link(high, low);
}

fn spectrum_plus3(kempston: bool) -> PortDispatcher {
    let mut map = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
    common(&mut map, kempston);
    split_rom_paging(&mut map);
    sound(&mut map);
    map.add(PortHandler::new(
        FDC_STATUS,
        PortDevice::Storage(StorageRegister::FloppyStatus),
    ));
    map.add(PortHandler::new(
        FDC_DATA,
        PortDevice::Storage(StorageRegister::FloppyData),
    ));
    map.add(PortHandler::new(
        PRINTER,
        PortDevice::Latch(LatchPort::reading(0, 0xFF)),
    ));
    map.build()
}

fn spectrum_next(kempston: bool) -> PortDispatcher {
    let mut map = PortDispatcher::builder(UnhandledRead::Idle(0xFF));
    common(&mut map, kempston);

    let select = map.add(PortHandler::new(
        NEXT_SELECT,
        PortDevice::NextSelect(NextRegisterSelect::new()),
    ));
    let data = map.add(PortHandler::new(
        NEXT_DATA,
        PortDevice::NextData(NextRegisterData::new()),
    ));
    map.link(select, data);

    // $DFFD also matches the AY select decode, so it goes first.
    let low = map.add(PortHandler::new(
        PAGING_PLUS3,
        PortDevice::Paging7ffd(Paging7ffd::new()),
    ));
    let extension = map.add(PortHandler::new(
        BANK_EXTENSION,
        PortDevice::BankExtension(BankExtension::new()),
    ));
    let high = map.add(PortHandler::new(
        PAGING_1FFD,
        PortDevice::Paging1ffd(Paging1ffd::new()),
    ));
    map.link(low, high)
        .link(high, low)
        .link(extension, low)
        .link(extension, high);

    sound(&mut map);
    map.add(PortHandler::new(
        DIVIDE_CONTROL,
        PortDevice::Storage(StorageRegister::DivIdeControl),
    ));
    map.add(PortHandler::new(
        MMC_CONTROL,
        PortDevice::Storage(StorageRegister::MmcControl),
    ));
    map.add(PortHandler::new(
        MMC_DATA,
        PortDevice::Storage(StorageRegister::MmcData),
    ));
    map.add(PortHandler::new(TIMEX_SCREEN, PortDevice::Latch(LatchPort::new(0))));
    map.build()
}
