//! Severity levels and their fixed decorations.

use std::fmt;

/// Severity of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Log,
    Info,
    Debug,
    Warning,
    Error,
    Exception,
}

impl Level {
    /// Tag attached when the caller supplies none.
    pub fn default_tag(self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Exception => "exception",
        }
    }

    /// Color used when neither the caller nor the tag mapping picks one.
    pub fn default_color(self) -> &'static str {
        match self {
            Level::Log | Level::Info => "white",
            Level::Debug => "gray",
            Level::Warning => "gold",
            Level::Error | Level::Exception => "red",
        }
    }

    /// Marker prepended to the message text.
    pub fn prefix(self) -> &'static str {
        match self {
            Level::Log | Level::Info => "",
            Level::Debug => "## ",
            Level::Warning => "⚠️ ",
            Level::Error | Level::Exception => "**** ",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_tag())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}
