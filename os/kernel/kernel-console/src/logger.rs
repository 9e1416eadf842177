use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `[LEVEL] target: message` lines to a sink.
pub struct ConsoleLogger {
    max_level: LevelFilter,
    sink: fn(fmt::Arguments),
}

impl ConsoleLogger {
    /// Logger writing to the UART console.
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self::with_sink(max_level, crate::console_fmt::console_write)
    }

    #[must_use]
    pub const fn with_sink(max_level: LevelFilter, sink: fn(fmt::Arguments)) -> Self {
        Self { max_level, sink }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// If a logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        (self.sink)(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}
