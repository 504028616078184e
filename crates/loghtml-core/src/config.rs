//! Logger configuration.
//!
//! Every recognised option lives on [`LoggerConfig`]. Durations are encoded
//! as milliseconds when (de)serialised, so a JSON config looks like:
//!
//! ```json
//! {
//!   "log_dir": "logs",
//!   "main_filename": "log.html",
//!   "max_size": 5000000,
//!   "max_files": 15,
//!   "buffer_size": 5,
//!   "flush_interval": 200,
//!   "tag_colors": { "database": "cyan" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

/// Default rotation threshold in bytes.
pub const DEFAULT_MAX_SIZE: u64 = 5_000_000;

/// Default number of rotated documents kept.
pub const DEFAULT_MAX_FILES: usize = 15;

/// Default number of buffered lines before the writer drains to disk.
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Default time between forced drains.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Default capacity of the logger's record queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Interval used when filter-signal detection is switched on without an
/// explicit value.
pub const DEFAULT_FILTER_SIGNAL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for an [`HtmlWriter`](crate::HtmlWriter) and the
/// [`HtmlLogger`](crate::HtmlLogger) in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory holding the active and rotated documents (created if missing).
    pub log_dir: PathBuf,

    /// File name of the active document inside `log_dir`.
    pub main_filename: String,

    /// Rotation threshold: bytes of log content written to one document.
    pub max_size: u64,

    /// How many rotated documents to keep (the active one is not counted).
    pub max_files: usize,

    /// Lines buffered in memory before they are written out.
    pub buffer_size: usize,

    /// Maximum age of buffered lines before a drain is forced.
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,

    /// Capacity of the bounded queue between callers and the writer thread.
    pub queue_capacity: usize,

    /// Default color per tag, used when the caller gives no color.
    pub tag_colors: BTreeMap<String, String>,

    /// When set, the end of the document is scanned at most this often for
    /// an externally written filter-mode signal.
    #[serde(with = "duration_ms::option")]
    pub filter_signal_interval: Option<Duration>,

    /// Custom document template; the built-in one is used when unset or
    /// unreadable.
    pub template_file: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            main_filename: "log.html".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            max_files: DEFAULT_MAX_FILES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            tag_colors: BTreeMap::new(),
            filter_signal_interval: None,
            template_file: None,
        }
    }
}

impl LoggerConfig {
    /// Create a config writing into `log_dir` with all other options at
    /// their defaults.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON config. Missing keys take their default value.
    pub fn from_json_str(json: &str) -> LogResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> LogResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_main_filename(mut self, name: impl Into<String>) -> Self {
        self.main_filename = name.into();
        self
    }

    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_buffer_size(mut self, lines: usize) -> Self {
        self.buffer_size = lines;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Map `tag` to a default color.
    pub fn with_tag_color(mut self, tag: impl Into<String>, color: impl Into<String>) -> Self {
        self.tag_colors.insert(tag.into(), color.into());
        self
    }

    /// Enable filter-signal detection at the default one-second interval.
    pub fn with_filter_signal_detection(mut self) -> Self {
        self.filter_signal_interval = Some(DEFAULT_FILTER_SIGNAL_INTERVAL);
        self
    }

    pub fn with_template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_file = Some(path.into());
        self
    }

    /// Path of the active document.
    pub fn active_path(&self) -> PathBuf {
        self.log_dir.join(&self.main_filename)
    }

    /// Reject option values the writer cannot work with.
    pub fn validate(&self) -> LogResult<()> {
        if self.main_filename.trim().is_empty() {
            return Err(LogError::InvalidConfig(
                "main_filename must not be empty".to_string(),
            ));
        }
        if self.main_filename.contains(['/', '\\']) {
            return Err(LogError::InvalidConfig(format!(
                "main_filename must be a bare file name, got {:?}",
                self.main_filename
            )));
        }
        if self.max_size == 0 {
            return Err(LogError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.max_files == 0 {
            return Err(LogError::InvalidConfig(
                "max_files must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(LogError::InvalidConfig(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(LogError::InvalidConfig(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(LogError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if matches!(self.filter_signal_interval, Some(d) if d.is_zero()) {
            return Err(LogError::InvalidConfig(
                "filter_signal_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Millisecond (de)serialisation for `Duration` fields.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
