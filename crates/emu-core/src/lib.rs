//! Collaborator contracts shared by the Spectrum bus crates.
//!
//! The bus components never own a CPU, a sound chip or a disk controller.
//! They reach those through the small traits here, so a host can plug in any
//! implementation (or none) without the chip crates knowing about it.

mod clock;
mod observable;
mod register;
mod snapshot;

pub use clock::{CpuClock, CycleCounter};
pub use observable::{Observable, Value};
pub use register::{RegisterBank, RegisterSink};
pub use snapshot::{Snapshot, SnapshotError};
