use vte::{Parser, Perform};

const TAB_WIDTH: usize = 4;

/// Reduces producer text to printable characters on a single row. Escape and control
/// sequences are dropped so they can't move the cursor out from under the renderer.
pub fn sanitize(text: &str) -> String {
    let mut performer = Performer::default();
    let mut parser = Parser::new();
    for byte in text.as_bytes() {
        parser.advance(&mut performer, *byte);
    }
    performer.text
}

/// Splits on newlines first, then sanitizes each line.
pub fn sanitize_lines(text: &str) -> Vec<String> {
    text.lines().map(sanitize).collect()
}

// Private struct to hide this implementation detail
#[derive(Default)]
struct Performer {
    text: String,
}

impl Perform for Performer {
    fn print(&mut self, c: char) {
        self.text.push(c)
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\t' => self.text.extend(std::iter::repeat(' ').take(TAB_WIDTH)),
            b'\n' | b'\r' => self.text.push(' '),
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::{sanitize, sanitize_lines};

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(sanitize("copied 3 files (ok)"), "copied 3 files (ok)");
    }

    #[test]
    fn keeps_unicode() {
        assert_eq!(sanitize("tâche terminée ✓"), "tâche terminée ✓");
    }

    #[test]
    fn strips_cursor_movement_and_colors() {
        assert_eq!(sanitize("\x1b[2Aup\x1b[31mred\x1b[0m\x1b[Kend"), "upredend");
    }

    #[test]
    fn flattens_control_characters() {
        assert_eq!(sanitize("a\tb\r\nc\x07"), "a    b  c");
    }

    #[test]
    fn splits_multi_line_reports() {
        assert_eq!(
            sanitize_lines("Traceback:\n\x1b[1m  frame\x1b[0m\n"),
            vec!["Traceback:".to_owned(), "  frame".to_owned()]
        );
    }
}
