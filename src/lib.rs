#![no_std]
//! Driver for HD44780 character LCDs sitting behind a PCF8574 I2C GPIO
//! expander ("backpack"), operated in 4-bit nibble mode. It needs an I2C
//! instance implementing [`embedded_hal::i2c::I2c`] and a delay provider
//! implementing [`embedded_hal::delay::DelayNs`].
//!
//! Every command byte crosses the bus as two half-byte phases, each latched
//! by pulsing the enable line; the register-select and backlight lines ride
//! along in the low bits of every expander byte. See [`sync_lcd::Lcd`] for
//! the blocking API, or enable the `async` feature for the
//! `embedded-hal-async` counterpart.
//!
//! Usage:
//! ```ignore
//! // Any embedded-hal 1.0 I2C bus and delay will do, e.g. from arduino-hal:
//! let dp = arduino_hal::Peripherals::take().unwrap();
//! let pins = arduino_hal::pins!(dp);
//! let mut i2c = arduino_hal::I2c::new(
//!     dp.TWI,
//!     pins.a4.into_pull_up_input(),
//!     pins.a5.into_pull_up_input(),
//!     50000,
//! );
//! let mut delay = arduino_hal::Delay::new();
//!
//! let mut lcd = lcd_hd44780_pcf8574::Lcd::new(&mut i2c, &mut delay)
//!     .with_address(lcd_hd44780_pcf8574::DEFAULT_ADDRESS)
//!     .with_rows(2)
//!     .with_cols(16)
//!     .init()?;
//!
//! lcd.backlight_on()?;
//! lcd.set_cursor(0, 3)?;
//! lcd.write_str("hello")?;
//! ```
//!
//! This [site][lcd address] describes how to find the address of your
//! backpack; the common modules answer at 0x27 (write address 0x4E).
//!
//! [lcd address]: https://www.ardumotive.com/i2clcden.html

mod frame;
pub mod sync_lcd;

#[cfg(feature = "async")]
pub mod async_lcd;

pub use sync_lcd::Lcd;

/// 7-bit address of the common PCF8574 backpack modules. The boards are
/// usually labelled with the 8-bit write address 0x4E instead.
pub const DEFAULT_ADDRESS: u8 = 0x27;

/// Selects whether a transmitted byte goes to the instruction register or to
/// display data (DDRAM/CGRAM).
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RegisterSelect {
    Instruction = 0x00,
    Data = 0x01,
}

impl Default for RegisterSelect {
    fn default() -> Self {
        RegisterSelect::Instruction
    }
}

/// Direction the cursor advances after each written character.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EntryDirection {
    Left = 0x00,
    Right = 0x01,
}

impl Default for EntryDirection {
    fn default() -> Self {
        EntryDirection::Left
    }
}

// HD44780 instruction opcodes.
pub(crate) const CMD_CLEAR: u8 = 0x01;
pub(crate) const CMD_HOME: u8 = 0x02;
pub(crate) const CMD_ENTRY_MODE: u8 = 0x04;
pub(crate) const CMD_DISPLAY_CONTROL: u8 = 0x08;
pub(crate) const CMD_SHIFT_CURSOR_LEFT: u8 = 0x10;
pub(crate) const CMD_SHIFT_CURSOR_RIGHT: u8 = 0x14;
pub(crate) const CMD_SHIFT_DISPLAY_LEFT: u8 = 0x18;
pub(crate) const CMD_SHIFT_DISPLAY_RIGHT: u8 = 0x1C;
pub(crate) const CMD_SET_CGRAM_ADDR: u8 = 0x40;
pub(crate) const CMD_SET_DDRAM_ADDR: u8 = 0x80;

/// Cold-start bytes forced into the controller as single-nibble writes:
/// three times 8-bit function-set, the 4-bit switch, then line/font setup.
pub(crate) const BOOTSTRAP_SEQUENCE: [u8; 5] = [0x30, 0x30, 0x30, 0x20, 0x40];

/// DDRAM base address of each display row.
pub(crate) const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

// Datasheet timing: minimum enable pulse width, instruction execution time,
// the longer cycle of clear/home, and the wait between cold-start bytes.
pub(crate) const STROBE_WIDTH_US: u32 = 1;
pub(crate) const SETTLE_SHORT_US: u32 = 37;
pub(crate) const SETTLE_LONG_MS: u32 = 2;
pub(crate) const BOOTSTRAP_SETTLE_MS: u32 = 5;
