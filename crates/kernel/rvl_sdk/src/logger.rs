//! `log` backend writing whole lines to a console sink.
//!
//! Nothing here knows how to draw text. The application registers a sink
//! with [`set_sink`]; until then output is discarded.

use core::fmt::{self, Write as _};

use arrayvec::ArrayString;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use rvl_hal::interrupt;

use crate::slot::IrqSlot;

/// Receives finished output, one or more whole lines at a time.
pub type Sink = fn(&str);

/// Longest line a record is formatted into; longer ones are cut.
pub const LINE_LEN: usize = 256;

fn discard(_: &str) {}

static SINK: IrqSlot<Sink> = IrqSlot::new(discard);

static LOGGER: SdkLogger = SdkLogger;

/// Replaces the console sink. Returns the previous one.
pub fn set_sink(sink: Sink) -> Sink {
    SINK.replace(sink)
}

/// Writes `s` straight to the sink, bypassing the `log` facade.
pub fn write_raw(s: &str) {
    let sink = SINK.get();
    interrupt::with_push_disabled(|| sink(s));
}

/// Installs the logger and sets the maximum level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Formatter output that keeps what fits and drops the rest.
pub(crate) struct Line(ArrayString<LINE_LEN>);

impl Line {
    pub(crate) const fn new() -> Self {
        Self(ArrayString::new_const())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.0.remaining_capacity();
        let mut end = s.len().min(room);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.0.push_str(&s[..end]);
        Ok(())
    }
}

fn format_record(record: &Record<'_>) -> Line {
    let mut line = Line::new();
    let _ = writeln!(
        line,
        "[{}] ({}) {}",
        record.level(),
        record.target(),
        record.args()
    );
    line
}

struct SdkLogger;

impl Log for SdkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            write_raw(format_record(record).as_str());
        }
    }

    fn flush(&self) {}
}
