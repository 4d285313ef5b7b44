//! Cycle-accurate ZX Spectrum bus.
//!
//! Covers the whole family from the 48K to the Next: paged memory, the ULA
//! screen driven by a per-cycle tact table, and the I/O port map of each
//! model. The CPU is not part of this crate; it reaches the bus through
//! [`emu_core::CpuClock`].

mod codec;
mod config;
pub mod input;
mod memory;
mod peripherals;
pub mod ports;
mod spectrum;

pub use config::{ConfigError, SpectrumConfig, SpectrumModel, UlaIssue};
pub use input::{InputState, Key};
pub use memory::{BANK_SIZE, ContendedBanks, MemoryLayout, MemoryPagingDevice, SlotSource};
pub use peripherals::{Peripherals, StorageRegister};
pub use ports::{PortAccess, PortDescriptor, PortDispatcher, PortHandler};
pub use spectrum::{IoContention, Spectrum};
