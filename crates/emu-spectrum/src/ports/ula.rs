//! ULA port $FE.
//!
//! Writes set the border (bits 0-2), MIC (bit 3) and EAR (bit 4). Reads
//! return the keyboard half-rows selected by the high address byte in bits
//! 0-4, 1s in bits 5 and 7, and the EAR input in bit 6.

use serde::{Deserialize, Serialize};

use super::{HostContext, PortContext};
use crate::config::UlaIssue;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UlaPort {
    last_out: u8,
    #[serde(skip)]
    issue: UlaIssue,
}

impl UlaPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn read(&mut self, address: u16, ctx: &mut PortContext<'_>) -> u8 {
        let keys = ctx.input.scan_keyboard((address >> 8) as u8);
        // With no tape, the input line picks up the ULA's own output.
        let ear = ctx.input.ear().unwrap_or(match self.issue {
            UlaIssue::Three => self.last_out & 0x10 != 0,
            UlaIssue::Two => self.last_out & 0x18 != 0,
        });
        keys | 0xA0 | if ear { 0x40 } else { 0 }
    }

    pub(super) fn write(&mut self, value: u8, ctx: &mut PortContext<'_>) {
        ctx.screen.set_border_colour(value);
        self.last_out = value;
    }

    /// The last byte written.
    #[must_use]
    pub fn last_out(&self) -> u8 {
        self.last_out
    }

    pub(super) fn reset(&mut self) {
        self.last_out = 0;
    }

    pub(super) fn attach(&mut self, host: &HostContext) {
        self.issue = host.ula_issue;
    }

    pub(super) fn keep_binding(&mut self, bound: &Self) {
        self.issue = bound.issue;
    }
}
