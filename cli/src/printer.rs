use std::env::{self, VarError};
use std::fmt::Display;
use std::io::{stdout, Stdout, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color, ContentStyle, Print, PrintStyledContent, StyledContent, Stylize,
};
use crossterm::tty::IsTty;

fn no_color_set() -> bool {
    !matches!(env::var("NO_COLOR"), Err(VarError::NotPresent))
}

pub mod color {
    use crossterm::style::Color;

    pub const RED: Color = Color::Rgb {
        r: 0xCC,
        g: 0x22,
        b: 0x22,
    };
    pub const YELLOW: Color = Color::Rgb {
        r: 0xDD,
        g: 0xBB,
        b: 0x22,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0x22,
        g: 0x88,
        b: 0x33,
    };
    pub const GREY: Color = Color::Rgb {
        r: 0xBB,
        g: 0xBB,
        b: 0xBB,
    };

    pub const FAVORITE: Color = YELLOW;
    pub const ERROR: Color = RED;
    pub const OK: Color = GREEN;
}

/// Writes to stdout, styling only when stdout is a terminal and `NO_COLOR`
/// isn't set
pub struct Printer {
    is_tty: bool,
    style_enabled: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            is_tty: stdout().is_tty(),
            style_enabled: !no_color_set(),
        }
    }

    pub fn println(&self, content: impl Display) {
        self.println_styled(content, ContentStyle::default())
    }

    pub fn print(&self, content: impl Display) {
        self.print_styled(content, ContentStyle::default())
    }

    pub fn println_colored(&self, content: impl Display, color: Color) {
        self.println_styled(content, ContentStyle::default().with(color))
    }

    pub fn print_colored(&self, content: impl Display, color: Color) {
        self.print_styled(content, ContentStyle::default().with(color))
    }

    /// A bold line, used for the sticky list headers
    pub fn println_header(&self, content: impl Display) {
        self.println_styled(content, ContentStyle::default().attribute(Attribute::Bold))
    }

    pub fn println_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, true)
    }

    pub fn print_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, false)
    }

    fn should_style(&self) -> bool {
        self.is_tty && self.style_enabled
    }

    fn do_styled_print(&self, content: impl Display, style: ContentStyle, with_nl: bool) {
        let should_style = self.should_style();
        with_stdout(|s| {
            if should_style {
                _ = queue!(s, PrintStyledContent(StyledContent::new(style, content)));
            } else {
                _ = queue!(s, Print(content));
            }
            if with_nl {
                _ = queue!(s, Print("\n"));
            }
        });
    }

    pub fn flush(&self) {
        with_stdout(|s| {
            _ = s.flush();
        })
    }
}

impl Drop for Printer {
    fn drop(&mut self) {
        self.flush();
    }
}

#[inline]
fn with_stdout<F: FnOnce(&mut Stdout)>(func: F) {
    let mut stdout = stdout();
    func(&mut stdout);
}
