use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveUp, Show};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use std::io::Write;

/// Draws frames in place below whatever the terminal already shows. Each frame starts by
/// moving back up over the previous one, so nothing above the frame is ever touched.
pub struct Renderer<W: Write> {
    output: W,
    drawn: Vec<String>,
    cursor_hidden: bool,
    disabled: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            drawn: Vec::new(),
            cursor_hidden: false,
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn drawn_height(&self) -> usize {
        self.drawn.len()
    }

    /// Redraws unless the frame is identical to what is already on screen. The first write
    /// failure is logged and turns every later call into a no-op.
    pub fn draw(&mut self, lines: &[String]) {
        if self.disabled || (self.cursor_hidden && self.drawn == lines) {
            return;
        }
        if let Err(err) = self.write_frame(lines) {
            log::error!("terminal write failed, rendering disabled: {err:#}");
            self.disabled = true;
        }
    }

    fn write_frame(&mut self, lines: &[String]) -> Result<()> {
        if !self.cursor_hidden {
            queue!(self.output, Hide)?;
            self.cursor_hidden = true;
        }
        // Back to the top of the previous frame. Relative moves stay valid after the terminal
        // scrolls, saved positions do not, and the frame is capped below the screen height.
        if let Ok(height @ 1..) = u16::try_from(self.drawn.len()) {
            queue!(self.output, MoveUp(height), Print('\r'))?;
        }
        for line in lines {
            queue!(
                self.output,
                Clear(ClearType::CurrentLine),
                Print(line),
                Print("\r\n")
            )?;
        }
        if lines.len() < self.drawn.len() {
            queue!(self.output, Clear(ClearType::FromCursorDown))?;
        }
        self.output.flush().context("flushing frame")?;
        self.drawn = lines.to_vec();
        Ok(())
    }

    /// Leaves the last frame on screen and gives the cursor back.
    pub fn release(&mut self) {
        if self.disabled || !self.cursor_hidden {
            return;
        }
        let restored = queue!(self.output, Show)
            .map_err(anyhow::Error::from)
            .and_then(|()| self.output.flush().context("restoring cursor"));
        if let Err(err) = restored {
            log::error!("could not restore the cursor: {err:#}");
            self.disabled = true;
        }
        self.cursor_hidden = false;
    }
}
