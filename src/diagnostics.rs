//! Fatal, source-located diagnostics.
//!
//! The front-end never recovers from malformed input: a source error
//! prints a `path:line:column:` prefixed message together with the
//! offending source line and terminates the process with status 1.
//! Warnings use the same formatting but let the run continue.

use std::fmt;
use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::source::{SourceId, SourceLocation, SourceReader};

/// Exit status used for every user-triggerable failure.
pub const ERROR_EXIT_CODE: i32 = 1;

/// Terminates the process with a plain (locationless) error message.
///
/// Used for resource exhaustion and platform failures, where no source
/// position is available.
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    let mut stream = StandardStream::stderr(color_choice());

    let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stream, "error");
    let _ = stream.reset();
    let _ = writeln!(stream, ": {}", args);

    std::process::exit(ERROR_EXIT_CODE);
}

/// Sink for source-located diagnostics.
///
/// The sink itself only carries output policy; the reader and the
/// position are supplied per report so the caller keeps ownership of
/// its pools.
pub struct ErrorSink {
    color: ColorChoice,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self {
            color: color_choice(),
        }
    }

    /// Reports a fatal source error and exits with status 1.
    pub fn source_error(
        &self,
        reader: &SourceReader,
        source_id: SourceId,
        args: fmt::Arguments<'_>,
    ) -> ! {
        self.report(reader, source_id, Severity::Error, args);

        std::process::exit(ERROR_EXIT_CODE);
    }

    /// Reports a warning and continues.
    pub fn source_warning(
        &self,
        reader: &SourceReader,
        source_id: SourceId,
        args: fmt::Arguments<'_>,
    ) {
        self.report(reader, source_id, Severity::Warning, args);
    }

    fn report(
        &self,
        reader: &SourceReader,
        source_id: SourceId,
        severity: Severity,
        args: fmt::Arguments<'_>,
    ) {
        let mut stream = StandardStream::stderr(self.color);

        let location = if source_id == SourceId::INVALID {
            None
        } else {
            Some(reader.source_location_from_id(source_id))
        };

        if let Some(location) = &location {
            let _ = write!(
                stream,
                "{}:{}:{}: ",
                location.filepath.display(),
                location.line_number,
                location.column_number
            );
        }

        let _ = stream.set_color(ColorSpec::new().set_fg(Some(severity.color())).set_bold(true));
        let _ = write!(stream, "{}", severity.label());
        let _ = stream.reset();
        let _ = writeln!(stream, ": {}", args);

        if let Some(location) = &location {
            write_context(&mut stream, location);
        }
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn color(self) -> Color {
        match self {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        }
    }
}

fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stderr) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Echoes the source line the diagnostic refers to, with a caret under
/// the offending column. The line is clamped to the terminal width so
/// pathological input cannot flood the report.
fn write_context(stream: &mut StandardStream, location: &SourceLocation) {
    let width = terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| usize::from(w).max(16))
        .unwrap_or(120);

    let chars: Vec<char> = location.context.chars().collect();

    let mut caret = location.column_number.saturating_sub(1) as usize;

    let window: String = if chars.len() + 4 > width {
        // Keep the window centered on the caret.
        let half = (width - 4) / 2;
        let start = caret.saturating_sub(half).min(chars.len());
        let end = (start + width - 4).min(chars.len());
        caret -= start;
        chars[start..end].iter().collect()
    } else {
        chars.iter().collect()
    };

    let _ = writeln!(stream, "    {}", window);
    let _ = writeln!(stream, "    {}^", " ".repeat(caret.min(window.chars().count())));
}
