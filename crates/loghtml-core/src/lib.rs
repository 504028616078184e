//! Live HTML log documents
//!
//! Writes log records into a single self-contained HTML file that a browser
//! can open and filter while the application is still running.
//!
//! ## Overview
//!
//! - **Coalesced color blocks**: consecutive records of the same color share
//!   one `<font color>` element
//! - **Well-formed while filtering**: in filter mode every flush leaves the
//!   file ending in a sentinel and the closing skeleton, so a reload never
//!   shows a half-written document
//! - **Filter mode**: records can be spliced in before a marker instead of
//!   appended, so client-side filtering keeps working on new lines
//! - **Rotation**: the active document is archived under a timestamped name
//!   once it grows past a size threshold; old archives are pruned
//!
//! ## Quick Start
//!
//! ```ignore
//! use loghtml_core::{HtmlLogger, LoggerConfig};
//!
//! let logger = HtmlLogger::new(LoggerConfig::new("./logs"))?;
//! logger.info("service started");
//! logger.warning_with("cache miss", None, ["cache", "perf"]);
//! logger.activate_filter_mode();
//! logger.error("boom");
//! println!("tags so far: {:?}", logger.get_used_tags());
//! logger.close();
//! ```
//!
//! To route `tracing` events into the same document, install an
//! [`HtmlLayer`] next to the usual fmt layer.

pub mod config;
pub mod document;
pub mod error;
pub mod layer;
pub mod level;
pub mod logger;
pub mod record;
pub mod rotation;
pub mod signal;
pub mod tags;
pub mod template;
pub mod writer;

// Re-exports
pub use config::LoggerConfig;
pub use error::{LogError, LogResult};
pub use layer::HtmlLayer;
pub use level::Level;
pub use logger::HtmlLogger;
pub use record::{escape_html, LogRecord, Tags};
pub use rotation::{Rotation, RotationPolicy};
pub use signal::{FilterRequest, FilterSignalWatch};
pub use tags::TagIndex;
pub use template::{BuiltinTemplate, FileTemplate, TemplateProvider};
pub use writer::{HtmlWriter, InsertionMode};
