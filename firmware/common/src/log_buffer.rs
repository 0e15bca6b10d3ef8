//! Debug message queue with levels and timestamps.
//!
//! Provides a circular buffer of log entries that a debug consumer (UART
//! task, simulator console) drains. Each entry has a log level, message and
//! timestamp. With the `defmt` feature enabled, every message is also sent
//! to the defmt logger.
//!
//! # Log Levels
//!
//! - `Trace`: verbose debugging
//! - `Debug`: registry transitions
//! - `Info`: normal operation
//! - `Warn`: runtime errors, recoverable
//! - `Error`: programming errors, double errors, watchdog timeouts
//!
//! # Usage
//!
//! ```ignore
//! use ecu_common::{log_info, log_warn};
//!
//! log_info!("Knock started, bin {}", bin);
//! log_warn!("{}: runtime error", id.name());
//! ```

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use heapless::{Deque, String};

/// Queue depth.
pub const LOG_ENTRIES: usize = 16;

/// Bytes per message.
pub const LOG_MSG_LEN: usize = 48;

/// Formatting buffer used by the logging macros.
pub type LogLine = String<LOG_MSG_LEN>;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Single-character tag for console output.
    pub const fn prefix(self) -> char {
        match self {
            Self::Trace => 'T',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
        }
    }
}

/// One queued message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Cut at `LOG_MSG_LEN` bytes on a character boundary.
    pub message: LogLine,
    /// Log clock at the time of the push.
    pub timestamp_ms: u32,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: &str,
        timestamp_ms: u32,
    ) -> Self {
        let mut cut = message.len().min(LOG_MSG_LEN);
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut line = LogLine::new();
        // Cannot fail: at most LOG_MSG_LEN bytes
        let _ = line.push_str(&message[..cut]);
        Self {
            level,
            message: line,
            timestamp_ms,
        }
    }
}

/// FIFO of log entries. When full, the oldest entry makes room for the newest.
pub struct LogBuffer {
    entries: Deque<LogEntry, LOG_ENTRIES>,
    dropped: u32,
}

impl LogBuffer {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(
        &mut self,
        entry: LogEntry,
    ) {
        if self.entries.is_full() {
            self.entries.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        // Room was made above
        let _ = self.entries.push_back(entry);
    }

    pub fn pop_oldest(&mut self) -> Option<LogEntry> { self.entries.pop_front() }

    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Entries evicted before anyone drained them.
    #[inline]
    pub const fn dropped(&self) -> u32 { self.dropped }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> { self.entries.iter() }
}

impl Default for LogBuffer {
    fn default() -> Self { Self::new() }
}

/// Global message queue, drained by the debug consumer.
pub static LOG_BUFFER: Mutex<CriticalSectionRawMutex, LogBuffer> = Mutex::new(LogBuffer::new());

/// Log clock published by the main loop.
static LOG_CLOCK_MS: AtomicU32 = AtomicU32::new(0);

/// Entries below this level are not queued (defmt has its own filter).
static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Trace as u8);

#[inline]
pub fn set_timestamp_ms(ms: u32) { LOG_CLOCK_MS.store(ms, Ordering::Relaxed); }

#[inline]
pub fn current_timestamp_ms() -> u32 { LOG_CLOCK_MS.load(Ordering::Relaxed) }

/// Drop queued messages below `level` from now on.
#[inline]
pub fn set_min_level(level: LogLevel) { MIN_LEVEL.store(level as u8, Ordering::Relaxed); }

/// Queue a message on the global buffer.
///
/// Never blocks: if the buffer is locked elsewhere, the message is lost.
pub fn push_log(
    level: LogLevel,
    message: &str,
) {
    if (level as u8) < MIN_LEVEL.load(Ordering::Relaxed) {
        return;
    }
    let entry = LogEntry::new(level, message, current_timestamp_ms());
    if let Ok(mut buffer) = LOG_BUFFER.try_lock() {
        buffer.push(entry);
    }
}

/// Forward a message to defmt at the given level.
#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_defmt {
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_defmt {
    ($level:ident, $($arg:tt)*) => {};
}

/// Format into the log buffer at `$level` and forward to defmt.
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $variant:ident, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let mut buf = $crate::log_buffer::LogLine::new();
        let _ = write!(buf, $($arg)*);
        $crate::log_buffer::push_log($crate::log_buffer::LogLevel::$variant, buf.as_str());
        $crate::__log_defmt!($level, $($arg)*);
    }};
}

/// Log a message at Trace level.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__log!(trace, Trace, $($arg)*) };
}

/// Log a message at Debug level.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__log!(debug, Debug, $($arg)*) };
}

/// Log a message at Info level.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__log!(info, Info, $($arg)*) };
}

/// Log a message at Warn level.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__log!(warn, Warn, $($arg)*) };
}

/// Log a message at Error level.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__log!(error, Error, $($arg)*) };
}

// =============================================================================
// Unit Tests
// =============================================================================
