// Console output: plain messages and panels rendered off-screen by ratatui.
//
// Panels are drawn into a `Buffer` and written row by row with crossterm
// styling commands, so they scroll like ordinary output instead of taking
// over the screen.

use std::io::{self, IsTerminal, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor,
    SetForegroundColor,
};
use ratatui::buffer::{Buffer, Cell};
use ratatui::style::{Color, Modifier};

/// Marks every cell as changed when diffing against a rendered panel.
const UNSET: &str = "\u{0}";

const ATTRIBUTES: [(Modifier, Attribute); 5] = [
    (Modifier::BOLD, Attribute::Bold),
    (Modifier::DIM, Attribute::Dim),
    (Modifier::ITALIC, Attribute::Italic),
    (Modifier::UNDERLINED, Attribute::Underlined),
    (Modifier::REVERSED, Attribute::Reverse),
];

/// One thing to print.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text(String),
    Panel(Buffer),
}

impl Output {
    pub fn text(text: impl Into<String>) -> Self {
        Output::Text(text.into())
    }

    /// Plain-text lines, as written when styling is off.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Output::Text(text) => text.lines().map(str::to_string).collect(),
            Output::Panel(buf) => buffer_lines(buf),
        }
    }
}

pub struct Printer<W: Write> {
    out: W,
    styled: bool,
}

impl Printer<io::Stdout> {
    /// Stdout, styled only when it is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        Printer { out, styled }
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Printer { out, styled }
    }

    pub fn print(&mut self, output: &Output) -> io::Result<()> {
        match output {
            Output::Text(text) => writeln!(self.out, "{text}")?,
            Output::Panel(buf) => self.write_panel(buf)?,
        }
        self.out.flush()
    }

    fn write_panel(&mut self, buf: &Buffer) -> io::Result<()> {
        for row in visible_rows(buf) {
            for cell in row {
                if self.styled {
                    queue!(
                        self.out,
                        SetForegroundColor(term_color(cell.fg)),
                        SetBackgroundColor(term_color(cell.bg))
                    )?;
                    for (modifier, attribute) in ATTRIBUTES {
                        if cell.modifier.contains(modifier) {
                            queue!(self.out, SetAttribute(attribute))?;
                        }
                    }
                    queue!(self.out, Print(cell.symbol()), SetAttribute(Attribute::Reset))?;
                } else {
                    self.out.write_all(cell.symbol().as_bytes())?;
                }
            }
            if self.styled {
                queue!(self.out, ResetColor)?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Cells to print for each row. Cells hidden behind wide glyphs are left
/// out, as are trailing unstyled blanks.
fn visible_rows(buf: &Buffer) -> Vec<Vec<&Cell>> {
    let mut unset = buf.clone();
    for cell in &mut unset.content {
        cell.set_symbol(UNSET);
    }

    let mut rows: Vec<Vec<&Cell>> = vec![Vec::new(); usize::from(buf.area.height)];
    for (_, y, cell) in unset.diff(buf) {
        rows[usize::from(y - buf.area.y)].push(cell);
    }
    for row in &mut rows {
        while row
            .last()
            .is_some_and(|c| c.symbol() == " " && c.bg == Color::Reset)
        {
            row.pop();
        }
    }
    rows
}

pub fn buffer_lines(buf: &Buffer) -> Vec<String> {
    visible_rows(buf)
        .into_iter()
        .map(|row| row.iter().map(|c| c.symbol()).collect())
        .collect()
}

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Reset => TermColor::Reset,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Indexed(i) => TermColor::AnsiValue(i),
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
    }
}
