use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use crate::frame::{ddram_address, DisplayControl, EntryMode, LineState, Nibble};
use crate::{
    EntryDirection, RegisterSelect, BOOTSTRAP_SEQUENCE, BOOTSTRAP_SETTLE_MS, CMD_CLEAR, CMD_HOME,
    CMD_SET_CGRAM_ADDR, CMD_SET_DDRAM_ADDR, CMD_SHIFT_CURSOR_LEFT, CMD_SHIFT_CURSOR_RIGHT,
    CMD_SHIFT_DISPLAY_LEFT, CMD_SHIFT_DISPLAY_RIGHT, DEFAULT_ADDRESS, SETTLE_LONG_MS,
    SETTLE_SHORT_US, STROBE_WIDTH_US,
};

/// Async counterpart of [`crate::sync_lcd::Lcd`]. Same wire protocol and
/// timing, awaiting the bus and the delays instead of blocking on them.
pub struct Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    i2c: &'a mut I,
    delay: &'a mut D,
    address: u8,
    rows: u8,
    cols: u8,
    lines: LineState,
    control: DisplayControl,
    entry: EntryMode,
}

impl<'a, I, D> Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Create a new instance with only the I2C and delay instance.
    pub fn new(i2c: &'a mut I, delay: &'a mut D) -> Self {
        Self {
            i2c,
            delay,
            address: DEFAULT_ADDRESS,
            rows: 0,
            cols: 0,
            lines: LineState::default(),
            control: DisplayControl::default(),
            entry: EntryMode::default(),
        }
    }

    /// Set the 7-bit I2C address.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Number of display rows.
    pub fn with_rows(mut self, rows: u8) -> Self {
        self.rows = rows;
        self
    }

    /// Number of display columns.
    pub fn with_cols(mut self, cols: u8) -> Self {
        self.cols = cols;
        self
    }

    /// Run the cold-start procedure and leave the display on, cleared, with
    /// left-to-right entry and the cursor at (0, 0).
    pub async fn init(mut self) -> Result<Self, I::Error> {
        for &byte in BOOTSTRAP_SEQUENCE.iter() {
            self.transmit_bootstrap(byte).await?;
            self.delay.delay_ms(BOOTSTRAP_SETTLE_MS).await;
        }
        self.display_on().await?;
        self.clear().await?;
        self.entry_right().await?;
        self.return_home().await?;
        Ok(self)
    }

    async fn pulse(&mut self, nibble: Nibble) -> Result<(), I::Error> {
        self.lines.enable = true;
        let byte = self.lines.encode(nibble);
        self.i2c.write(self.address, &[byte]).await?;
        self.delay.delay_us(STROBE_WIDTH_US).await;

        self.lines.enable = false;
        let byte = self.lines.encode(nibble);
        self.i2c.write(self.address, &[byte]).await
    }

    async fn transmit(
        &mut self,
        payload: u8,
        register_select: RegisterSelect,
    ) -> Result<(), I::Error> {
        self.lines.payload = payload;
        self.lines.register_select = register_select;

        self.pulse(Nibble::High).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        self.pulse(Nibble::Low).await
    }

    async fn transmit_bootstrap(&mut self, payload: u8) -> Result<(), I::Error> {
        self.lines.payload = payload;
        self.lines.register_select = RegisterSelect::Instruction;
        self.pulse(Nibble::High).await
    }

    async fn command(&mut self, payload: u8) -> Result<(), I::Error> {
        self.transmit(payload, RegisterSelect::Instruction).await
    }

    /// Clear the display and reset the cursor to (0, 0).
    pub async fn clear(&mut self) -> Result<(), I::Error> {
        self.command(CMD_CLEAR).await?;
        self.delay.delay_ms(SETTLE_LONG_MS).await;
        Ok(())
    }

    /// Return the cursor to (0, 0) without clearing the display.
    pub async fn return_home(&mut self) -> Result<(), I::Error> {
        self.command(CMD_HOME).await?;
        self.delay.delay_ms(SETTLE_LONG_MS).await;
        Ok(())
    }

    async fn update_display_control(&mut self) -> Result<(), I::Error> {
        let byte = self.control.encode();
        self.command(byte).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Turn the display on. Cursor and blink keep their last-set state.
    pub async fn display_on(&mut self) -> Result<(), I::Error> {
        self.control.display_on = true;
        self.update_display_control().await
    }

    /// Turn the display off without losing its content.
    pub async fn display_off(&mut self) -> Result<(), I::Error> {
        self.control.display_on = false;
        self.update_display_control().await
    }

    /// Show the underline cursor.
    pub async fn cursor_on(&mut self) -> Result<(), I::Error> {
        self.control.cursor_on = true;
        self.update_display_control().await
    }

    /// Hide the underline cursor.
    pub async fn cursor_off(&mut self) -> Result<(), I::Error> {
        self.control.cursor_on = false;
        self.update_display_control().await
    }

    /// Blink the character cell at the cursor.
    pub async fn blink_on(&mut self) -> Result<(), I::Error> {
        self.control.blink_on = true;
        self.update_display_control().await
    }

    /// Stop blinking the cursor cell.
    pub async fn blink_off(&mut self) -> Result<(), I::Error> {
        self.control.blink_on = false;
        self.update_display_control().await
    }

    /// Advance the cursor to the right after each written character.
    pub async fn entry_right(&mut self) -> Result<(), I::Error> {
        self.entry.direction = EntryDirection::Right;
        let byte = self.entry.encode();
        self.command(byte).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Advance the cursor to the left after each written character.
    pub async fn entry_left(&mut self) -> Result<(), I::Error> {
        self.entry.direction = EntryDirection::Left;
        let byte = self.entry.encode();
        self.command(byte).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Shift the display window instead of moving the cursor on writes.
    pub async fn display_shift_on(&mut self) -> Result<(), I::Error> {
        self.entry.display_shift = true;
        let byte = self.entry.encode();
        self.command(byte).await?;
        self.delay.delay_ms(SETTLE_LONG_MS).await;
        Ok(())
    }

    /// Move the cursor on writes again, leaving the display window fixed.
    pub async fn display_shift_off(&mut self) -> Result<(), I::Error> {
        self.entry.display_shift = false;
        let byte = self.entry.encode();
        self.command(byte).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Move the cursor one cell to the right without writing.
    pub async fn shift_cursor_right(&mut self) -> Result<(), I::Error> {
        self.command(CMD_SHIFT_CURSOR_RIGHT).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Move the cursor one cell to the left without writing.
    pub async fn shift_cursor_left(&mut self) -> Result<(), I::Error> {
        self.command(CMD_SHIFT_CURSOR_LEFT).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Shift the whole display window one cell to the right.
    pub async fn shift_display_right(&mut self) -> Result<(), I::Error> {
        self.command(CMD_SHIFT_DISPLAY_RIGHT).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Shift the whole display window one cell to the left.
    pub async fn shift_display_left(&mut self) -> Result<(), I::Error> {
        self.command(CMD_SHIFT_DISPLAY_LEFT).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Turn the backlight on. The bit rides on every following transmission.
    pub async fn backlight_on(&mut self) -> Result<(), I::Error> {
        self.lines.backlight = true;
        self.command(0x00).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Turn the backlight off.
    pub async fn backlight_off(&mut self) -> Result<(), I::Error> {
        self.lines.backlight = false;
        self.command(0x00).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }

    /// Move the cursor to (row, col), zero-based. Positions outside the
    /// configured geometry are silently dropped.
    pub async fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), I::Error> {
        self.return_home().await?;
        if let Some(addr) = ddram_address(row, col, self.rows, self.cols) {
            self.command(addr).await?;
            self.delay.delay_us(SETTLE_SHORT_US).await;
        }
        Ok(())
    }

    /// Write a string at the current cursor position.
    pub async fn write_str(&mut self, data: &str) -> Result<(), I::Error> {
        for b in data.bytes() {
            self.transmit(b, RegisterSelect::Data).await?;
        }
        Ok(())
    }

    /// Program one of the eight CGRAM glyph slots, then restore the address
    /// pointer to DDRAM. `location` is masked to 0..=7.
    ///
    /// Needs validation on real hardware, see [`crate::sync_lcd::Lcd::create_char`].
    pub async fn create_char(&mut self, location: u8, charmap: [u8; 8]) -> Result<(), I::Error> {
        let location = location & 0x07;

        self.command(CMD_SET_CGRAM_ADDR | location << 3).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;

        for &row in charmap.iter() {
            self.transmit(row, RegisterSelect::Data).await?;
            self.delay.delay_us(SETTLE_SHORT_US).await;
        }

        self.command(CMD_SET_DDRAM_ADDR).await?;
        self.delay.delay_us(SETTLE_SHORT_US).await;
        Ok(())
    }
}
