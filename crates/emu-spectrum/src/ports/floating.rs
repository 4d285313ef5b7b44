//! Floating bus.
//!
//! Reading a port nobody drives returns whatever the ULA has on the data
//! bus. On a fetch cycle that is the display byte being fetched; otherwise
//! it is the last byte a contended access left there.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use sinclair_ula::TactTable;

use super::{HostContext, PortContext};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloatingBus {
    #[serde(skip)]
    tacts: Option<Rc<TactTable>>,
}

impl FloatingBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Until attached, reads return the last contended value.
    pub(super) fn read(&self, ctx: &mut PortContext<'_>) -> u8 {
        let Some(tacts) = &self.tacts else {
            return ctx.memory.last_contended_value();
        };
        let tact = tacts.get(ctx.frame_tact);
        if tact.phase.fetches_pixel() || tact.phase.fetches_attr() {
            ctx.memory.read(tact.fetch_address, true)
        } else {
            ctx.memory.last_contended_value()
        }
    }

    pub(super) fn attach(&mut self, host: &HostContext) {
        self.tacts = Some(Rc::clone(&host.tacts));
    }

    pub(super) fn keep_binding(&mut self, bound: &Self) {
        self.tacts.clone_from(&bound.tacts);
    }
}
