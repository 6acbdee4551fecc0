//! Colored terminal output.
//!
//! Status lines go to stdout and honor quiet mode; errors always go to
//! stderr. Output failures are swallowed, a broken terminal must not mask
//! the command result.

use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    quiet: bool,
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            quiet,
        }
    }

    /// Print an info message (normal output)
    pub fn info(&self, message: &str) {
        self.status(message, Color::Cyan, "ℹ");
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.status(message, Color::Green, "✓");
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.status(message, Color::Yellow, "⚠");
    }

    /// Print an error message (always shown, on stderr)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(&mut buffer, "✗");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {message}");
        let _ = bufwtr.print(&buffer);
    }

    /// Print a plain counter line to stderr (respects quiet mode)
    pub fn step(&self, message: &str) {
        if self.quiet {
            return;
        }
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{message}");
        let _ = bufwtr.print(&buffer);
    }

    /// Print a progress message for a long-running step
    pub fn progress(&self, message: &str) {
        self.status(message, Color::Magenta, "⋯");
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(&mut buffer, "═══ {title} ═══");
        let _ = buffer.reset();
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "    {message}");
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{message}");
        let _ = self.bufwtr.print(&buffer);
    }

    fn status(&self, message: &str, color: Color, marker: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(&mut buffer, "{marker}");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {message}");
        let _ = self.bufwtr.print(&buffer);
    }
}
