//! Kernel logger
//!
//! `log::Log` backend for the scheduler core. Records are formatted as
//! `[LEVEL] message` into a fixed stack buffer (no allocation, so it is
//! usable with interrupts disabled) and handed to a console sink: the
//! serial port on hardware, a capture buffer on the host.

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Size of the per-record formatting buffer
pub const LINE_BUFFER_SIZE: usize = 512;

/// Console output function
pub type ConsoleSink = fn(&[u8]);

/// Logger writing to the installed console sink
struct KernelLogger {
    sink: Once<ConsoleSink>,
}

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            let mut buf = [0u8; LINE_BUFFER_SIZE];
            let len = format_record(&mut buf, record.level(), record.args());
            sink(&buf[..len]);
        }
    }

    fn flush(&self) {}
}

/// Fixed-size writer for formatting without alloc; silently truncates
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }
}

impl<'a> core::fmt::Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Format one log line into `buf`, returns the number of bytes used
pub fn format_record(buf: &mut [u8], level: Level, args: &core::fmt::Arguments) -> usize {
    use core::fmt::Write;
    let mut writer = BufferWriter::new(buf);
    let _ = write!(&mut writer, "[{}] {}\n", level_str(level), args);
    writer.pos
}

/// Global logger instance
static LOGGER: KernelLogger = KernelLogger { sink: Once::new() };

/// Install the logger.
///
/// The first call installs `sink`; later calls only change the level.
pub fn init(sink: ConsoleSink, level: LevelFilter) {
    let mut installed = false;
    LOGGER.sink.call_once(|| {
        installed = true;
        sink
    });
    if installed && log::set_logger(&LOGGER).is_err() {
        // Another logger owns the facade (host test harness); keep it.
        return;
    }
    log::set_max_level(level);
}
