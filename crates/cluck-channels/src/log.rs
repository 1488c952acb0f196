//! Log levels and log targets.

use std::fmt;

use crate::error::ChannelError;

/// Severity of a log message. Higher is more severe; the gaps between levels
/// are part of the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum LogLevel {
    Finest = -9,
    Finer = -6,
    Fine = -3,
    Config = 0,
    Info = 3,
    Warning = 6,
    Severe = 9,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Finest,
        LogLevel::Finer,
        LogLevel::Fine,
        LogLevel::Config,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Severe,
    ];

    pub fn to_byte(self) -> i8 {
        self as i8
    }

    pub fn from_byte(id: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.to_byte() == id)
    }

    pub fn at_least_as_important(self, other: LogLevel) -> bool {
        self >= other
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Finest => "FINEST",
            LogLevel::Finer => "FINER",
            LogLevel::Fine => "FINE",
            LogLevel::Config => "CONFIG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Severe => "SEVERE",
        }
    }

    /// Four-letter form used in compact log lines.
    pub fn abbreviation(self) -> &'static str {
        match self {
            LogLevel::Finest => "FINS",
            LogLevel::Finer => "FINR",
            LogLevel::Fine => "FINE",
            LogLevel::Config => "CONF",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Severe => "SEVR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that accepts log messages.
pub trait LogTarget: Send + Sync {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError>;
}

impl<L: LogTarget + ?Sized> LogTarget for std::sync::Arc<L> {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError> {
        (**self).log(level, message)
    }
}

/// Re-emits log messages as `tracing` events, tagged with where they came from.
#[derive(Debug, Clone)]
pub struct TracingLogTarget {
    origin: String,
}

impl TracingLogTarget {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

impl LogTarget for TracingLogTarget {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError> {
        let origin = self.origin.as_str();
        match level {
            LogLevel::Severe => tracing::error!(origin, level = %level, "{message}"),
            LogLevel::Warning => tracing::warn!(origin, level = %level, "{message}"),
            LogLevel::Info | LogLevel::Config => {
                tracing::info!(origin, level = %level, "{message}")
            }
            LogLevel::Fine => tracing::debug!(origin, level = %level, "{message}"),
            LogLevel::Finer | LogLevel::Finest => {
                tracing::trace!(origin, level = %level, "{message}")
            }
        }
        Ok(())
    }
}
