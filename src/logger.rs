//! Semihosting backend for the `log` facade.
//!
//! Output goes to the debugger console. Slow, so the kernel only logs from
//! thread mode, never from its interrupt handlers.

use cortex_m::interrupt;
use cortex_m_semihosting::hprintln;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct SemihostingLogger;

static LOGGER: SemihostingLogger = SemihostingLogger;

impl Log for SemihostingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        interrupt::free(|_cs| {
            hprintln!("[{}] {}", record.level(), record.args());
        });
    }

    fn flush(&self) {}
}

/// Install the semihosting logger with the given maximum level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
