//! Expander byte encoding and the persistent control-line state.
//!
//! The PCF8574 drives the LCD through one output byte per bus write:
//! bit 0 = register select, bit 1 = R/W̄ (hardwired low, the driver never
//! reads back), bit 2 = enable strobe, bit 3 = backlight, bits 4-7 = one
//! data nibble. Everything here is pure; the bus and delays live in the
//! driver modules.

use crate::{
    EntryDirection, RegisterSelect, CMD_DISPLAY_CONTROL, CMD_ENTRY_MODE, CMD_SET_DDRAM_ADDR,
    ROW_OFFSETS,
};

const RS_BIT: u8 = 0x01;
const ENABLE_BIT: u8 = 0x04;
const BACKLIGHT_BIT: u8 = 0x08;

/// Which half of the payload byte goes onto the data lines.
#[derive(Copy, Clone)]
pub(crate) enum Nibble {
    High,
    Low,
}

/// Control-line state carried across both nibble phases of a command.
///
/// `enable` must stay low except while a strobe pulse is in flight;
/// `backlight` persists across every transmission until toggled.
#[derive(Default)]
pub(crate) struct LineState {
    pub register_select: RegisterSelect,
    pub enable: bool,
    pub backlight: bool,
    pub payload: u8,
}

impl LineState {
    fn control_bits(&self) -> u8 {
        let mut bits = self.register_select as u8 & RS_BIT;
        // bit 1 is the read/write line, always write (0)
        if self.enable {
            bits |= ENABLE_BIT;
        }
        if self.backlight {
            bits |= BACKLIGHT_BIT;
        }
        bits
    }

    /// Expander byte with payload bits 4-7 on the data lines.
    pub fn high_nibble(&self) -> u8 {
        (self.payload & 0xF0) | self.control_bits()
    }

    /// Expander byte with payload bits 0-3 shifted onto the data lines.
    pub fn low_nibble(&self) -> u8 {
        ((self.payload & 0x0F) << 4) | self.control_bits()
    }

    pub fn encode(&self, nibble: Nibble) -> u8 {
        match nibble {
            Nibble::High => self.high_nibble(),
            Nibble::Low => self.low_nibble(),
        }
    }
}

/// Display/cursor/blink flags, combined into one instruction byte.
///
/// The controller has no per-flag commands: every display-control write
/// carries all three bits, so toggling one flag must re-encode the other
/// two from their last-set values.
#[derive(Default)]
pub(crate) struct DisplayControl {
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}

impl DisplayControl {
    pub fn encode(&self) -> u8 {
        CMD_DISPLAY_CONTROL
            | self.blink_on as u8
            | (self.cursor_on as u8) << 1
            | (self.display_on as u8) << 2
    }
}

/// Entry-mode flags, same union rule as [`DisplayControl`].
#[derive(Default)]
pub(crate) struct EntryMode {
    pub direction: EntryDirection,
    pub display_shift: bool,
}

impl EntryMode {
    pub fn encode(&self) -> u8 {
        CMD_ENTRY_MODE | self.display_shift as u8 | (self.direction as u8) << 1
    }
}

/// Set-DDRAM-address instruction for `(row, col)`, or `None` when the
/// request falls outside the configured geometry. Out-of-range positions
/// are never sent to the hardware.
pub(crate) fn ddram_address(row: u8, col: u8, row_limit: u8, col_limit: u8) -> Option<u8> {
    if row >= row_limit || col >= col_limit {
        return None;
    }
    let base = ROW_OFFSETS.get(row as usize).copied()?;
    // a sufficiently large configured geometry could push base + col past
    // u8; treat that like any other out-of-range request
    Some(CMD_SET_DDRAM_ADDR | base.checked_add(col)?)
}
