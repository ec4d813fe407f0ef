// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Logging
//!
//! Logging for the IPC core. Messages are forwarded to the `log` facade
//! under the `rustux::ipc` target, so whichever logger the embedding kernel
//! (or a host test) installs receives them. With the `log` feature off the
//! macros still type-check their arguments but emit nothing.
//!
//! # Usage
//!
//! ```rust,ignore
//! log_info!("Channel subsystem initialized");
//! log_debug!("sys_channel_write: handle={:#x} bytes={}", handle, len);
//! log_trace_if!(LOCAL_TRACE, "observer {} fired", id);
//! ```

/// Log target used by every message from this crate
pub const LOG_TARGET: &str = "rustux::ipc";

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace-level logging (very verbose)
    Trace = 0,

    /// Debug-level logging (verbose)
    Debug = 1,

    /// Informational logging
    Info = 2,

    /// Warning-level logging
    Warning = 3,

    /// Error-level logging
    Error = 4,
}

impl LogLevel {
    /// Get the log level name as a string
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    #[cfg(feature = "log")]
    fn into_log_level(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Print a log message
///
/// Backend of the `log_*!` macros; prefer those.
#[cfg(feature = "log")]
#[inline]
pub fn log_print(level: LogLevel, args: core::fmt::Arguments) {
    log::log!(target: LOG_TARGET, level.into_log_level(), "{}", args);
}

/// Print a log message
#[cfg(not(feature = "log"))]
#[inline(always)]
pub fn log_print(_level: LogLevel, _args: core::fmt::Arguments) {}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print(
            $crate::kernel::debug::LogLevel::Trace,
            format_args!($($arg)*),
        )
    };
}

/// Log a trace message if condition is true
#[macro_export]
macro_rules! log_trace_if {
    ($cond:expr, $($arg:tt)*) => {
        if $cond {
            $crate::log_trace!($($arg)*);
        }
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print(
            $crate::kernel::debug::LogLevel::Debug,
            format_args!($($arg)*),
        )
    };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print(
            $crate::kernel::debug::LogLevel::Info,
            format_args!($($arg)*),
        )
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print(
            $crate::kernel::debug::LogLevel::Warning,
            format_args!($($arg)*),
        )
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print(
            $crate::kernel::debug::LogLevel::Error,
            format_args!($($arg)*),
        )
    };
}
