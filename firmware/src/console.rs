//! Firmware console and log sink.
//!
//! The UART driver lives outside of the hart core: the platform registers it once through
//! [`register`], after which both the printing macros and the [`log`] facade write to it.

use core::fmt::{self, Write};

use log::{Level, Log, Metadata, Record, SetLoggerError};
use spin::{Mutex, Once};

/// The global console instance.
static CONSOLE: Once<&'static dyn Console> = Once::new();

/// Serializes log lines coming from different harts.
static LINE_LOCK: Mutex<()> = Mutex::new(());

static LOGGER: ConsoleLogger = ConsoleLogger;

/// A byte sink able to display firmware output.
pub trait Console: Send + Sync {
    /// Writes a single byte to the console.
    fn put(&self, byte: u8);
}

/// A reference to the registered console that implements `fmt::Write`.
#[derive(Debug)]
pub struct ConsoleRef;

impl fmt::Write for ConsoleRef {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(con) = CONSOLE.get() {
            for byte in s.bytes() {
                con.put(byte);
            }
        }
        Ok(())
    }
}

/// Registers the global console. Only the first registration has any effect.
pub fn register(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
}

/// Returns a reference for the console.
///
/// Output written before a console has been registered is discarded.
pub fn get() -> ConsoleRef {
    ConsoleRef
}

/// Writes preformatted arguments to the console. Used by [`sbi_print!`] and [`sbi_println!`].
#[doc(hidden)]
pub fn print(args: fmt::Arguments<'_>) {
    let _ = get().write_fmt(args);
}

/// Forwards [`log`] records to the registered console.
#[derive(Debug)]
pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _guard = LINE_LOCK.lock();
        let _ = writeln!(
            get(),
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs [`ConsoleLogger`] as the global logger, enabling records up to `level`.
pub fn init_logger(level: Level) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level.to_level_filter());
    Ok(())
}
