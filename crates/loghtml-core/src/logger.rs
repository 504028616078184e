//! Severity-level facade over the writer.
//!
//! Callers format records on their own thread and push them into a bounded
//! queue. A single consumer thread owns the path into the [`HtmlWriter`]:
//!
//! ```text
//! caller threads ──log/info/...──▶ bounded queue ──▶ loghtml-writer thread
//!                                                      ├── HtmlWriter::write
//!                                                      ├── flush_if_due (timer)
//!                                                      └── flush / filter / close (acknowledged)
//! ```
//!
//! The host application constructs one logger, shares it by reference (or
//! `Arc`) and calls [`HtmlLogger::close`] on shutdown. Dropping the logger
//! closes it as a fallback.

use std::collections::BTreeMap;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::LoggerConfig;
use crate::error::LogResult;
use crate::level::Level;
use crate::record::{escape_html, LogRecord, Tags};
use crate::writer::HtmlWriter;

/// Work items for the writer thread.
enum Command {
    Write(LogRecord),
    Flush(Sender<()>),
    FilterMode(bool, Sender<()>),
    Rotate(Sender<()>),
    Close(Sender<()>),
}

/// Explicit logger instance writing to one live HTML document.
///
/// # Example
///
/// ```ignore
/// let logger = HtmlLogger::new(LoggerConfig::new("./logs"))?;
/// logger.info("service started");
/// logger.log_with("cache warm", Some("cyan"), "cache");
/// logger.error("boom");
/// logger.close();
/// ```
pub struct HtmlLogger {
    sender: Sender<Command>,
    writer: Arc<HtmlWriter>,
    tag_colors: BTreeMap<String, String>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl HtmlLogger {
    /// Open the document and start the writer thread.
    pub fn new(config: LoggerConfig) -> LogResult<Self> {
        let writer = Arc::new(HtmlWriter::new(config.clone())?);
        let (sender, receiver) = bounded(config.queue_capacity);

        let worker = {
            let writer = Arc::clone(&writer);
            let interval = config.flush_interval;
            thread::Builder::new()
                .name("loghtml-writer".to_string())
                .spawn(move || run_writer(writer, receiver, interval))?
        };

        Ok(Self {
            sender,
            writer,
            tag_colors: config.tag_colors,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the active document.
    pub fn path(&self) -> PathBuf {
        self.writer.path()
    }

    pub fn writer(&self) -> &Arc<HtmlWriter> {
        &self.writer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sorted list of every tag logged so far.
    pub fn get_used_tags(&self) -> Vec<String> {
        self.writer.tags().snapshot()
    }

    /// Format and queue one record.
    ///
    /// `message` is plain text and is escaped; the level prefix is prepended.
    /// Without tags the level's default tag is used. The color is `color`,
    /// else the configured color of the first tag, else the level default.
    pub fn emit(
        &self,
        level: Level,
        message: impl fmt::Display,
        color: Option<&str>,
        tags: impl Into<Tags>,
    ) {
        self.emit_html(level, escape_html(&message.to_string()), color, tags.into());
    }

    fn emit_html(&self, level: Level, message_html: String, color: Option<&str>, tags: Tags) {
        if self.is_closed() {
            return;
        }
        let tags = if tags.is_empty() {
            Tags::from(level.default_tag())
        } else {
            tags
        };
        let color = color
            .map(str::to_string)
            .or_else(|| tags.first().and_then(|t| self.tag_colors.get(t).cloned()))
            .unwrap_or_else(|| level.default_color().to_string());

        self.writer.tags().extend(tags.iter());
        let record = LogRecord::new(format!("{}{}", level.prefix(), message_html), color, tags);
        // Fails only once the writer thread is gone, i.e. after close.
        let _ = self.sender.send(Command::Write(record));
    }

    pub fn log(&self, message: impl fmt::Display) {
        self.emit(Level::Log, message, None, Tags::none());
    }

    pub fn log_with(&self, message: impl fmt::Display, color: Option<&str>, tags: impl Into<Tags>) {
        self.emit(Level::Log, message, color, tags);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.emit(Level::Info, message, None, Tags::none());
    }

    pub fn info_with(&self, message: impl fmt::Display, color: Option<&str>, tags: impl Into<Tags>) {
        self.emit(Level::Info, message, color, tags);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.emit(Level::Debug, message, None, Tags::none());
    }

    pub fn debug_with(&self, message: impl fmt::Display, color: Option<&str>, tags: impl Into<Tags>) {
        self.emit(Level::Debug, message, color, tags);
    }

    pub fn warning(&self, message: impl fmt::Display) {
        self.emit(Level::Warning, message, None, Tags::none());
    }

    pub fn warning_with(&self, message: impl fmt::Display, color: Option<&str>, tags: impl Into<Tags>) {
        self.emit(Level::Warning, message, color, tags);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.emit(Level::Error, message, None, Tags::none());
    }

    pub fn error_with(&self, message: impl fmt::Display, color: Option<&str>, tags: impl Into<Tags>) {
        self.emit(Level::Error, message, color, tags);
    }

    /// Log `error`, its source chain and the current backtrace as one
    /// `exception` record.
    ///
    /// With a `delay`, the calling thread sleeps for that long after the
    /// record is queued. This blocks the caller.
    pub fn report_exception(&self, error: &(dyn StdError + 'static), delay: Option<Duration>) {
        let current = thread::current();
        let mut text = format!(
            "Exception in thread '{}': {}",
            current.name().unwrap_or("unnamed"),
            error
        );
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(text, "\nCaused by: {cause}");
            source = cause.source();
        }
        let _ = write!(text, "\n{}", Backtrace::force_capture());

        let message = format!("Exception: <code>{}</code>", escape_html(&text));
        self.emit_html(Level::Exception, message, None, Tags::none());

        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }

    /// Block until every queued record is written and synced.
    pub fn flush(&self) {
        self.request(Command::Flush);
    }

    /// Switch the document to marker-insert mode once queued records are in.
    pub fn activate_filter_mode(&self) {
        self.request(|ack| Command::FilterMode(true, ack));
    }

    /// Return to append mode once queued records are in.
    pub fn deactivate_filter_mode(&self) {
        self.request(|ack| Command::FilterMode(false, ack));
    }

    /// Archive the active document after the queued records.
    pub fn rotate(&self) {
        self.request(Command::Rotate);
    }

    /// Drain the queue, finalize the document and stop the writer thread.
    ///
    /// Later calls are no-ops, as are log calls made after this returns.
    /// Never panics.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (ack, done) = bounded(1);
        if self.sender.send(Command::Close(ack)).is_ok() {
            let _ = done.recv();
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                // The writer thread died; make sure the document is closed.
                self.writer.close();
            }
        }
    }

    /// Send an acknowledged command and wait for it.
    fn request(&self, make: impl FnOnce(Sender<()>) -> Command) {
        if self.is_closed() {
            return;
        }
        let (ack, done) = bounded(1);
        if self.sender.send(make(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for HtmlLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_writer(writer: Arc<HtmlWriter>, receiver: Receiver<Command>, interval: Duration) {
    debug!(path = %writer.path().display(), "Writer thread started");
    loop {
        match receiver.recv_timeout(interval) {
            Ok(Command::Write(record)) => writer.write(&record),
            Ok(Command::Flush(ack)) => {
                writer.flush();
                let _ = ack.send(());
            }
            Ok(Command::FilterMode(on, ack)) => {
                if on {
                    writer.activate_filter_mode();
                } else {
                    writer.deactivate_filter_mode();
                }
                let _ = ack.send(());
            }
            Ok(Command::Rotate(ack)) => {
                writer.rotate();
                let _ = ack.send(());
            }
            Ok(Command::Close(ack)) => {
                writer.close();
                let _ = ack.send(());
                break;
            }
            Err(RecvTimeoutError::Timeout) => writer.flush_if_due(),
            Err(RecvTimeoutError::Disconnected) => {
                writer.close();
                break;
            }
        }
    }
    debug!("Writer thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FOOTER;
    use tempfile::TempDir;

    fn logger(temp: &TempDir) -> HtmlLogger {
        HtmlLogger::new(LoggerConfig::new(temp.path().join("logs"))).unwrap()
    }

    fn content(logger: &HtmlLogger) -> String {
        std::fs::read_to_string(logger.path()).unwrap()
    }

    #[test]
    fn test_error_record_is_red_tagged_and_prefixed() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        logger.error("boom");
        logger.flush();

        let content = content(&logger);
        assert!(content.contains("<font color=\"red\">\n<span data-tags=\"error\">"));
        assert!(content.contains(" - **** boom</span>"));
        assert_eq!(logger.get_used_tags(), vec!["error"]);
    }

    #[test]
    fn test_same_color_logs_coalesce() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        logger.log_with("hi", Some("blue"), "log");
        logger.log_with("bye", Some("blue"), "log");
        logger.close();

        let content = content(&logger);
        assert_eq!(content.matches("<font color=\"blue\">").count(), 1);
        let block = &content[content.find("<font color=\"blue\">").unwrap()..];
        let end = block.find("</font>").unwrap();
        assert!(block[..end].contains(" - hi</span>"));
        assert!(block[..end].contains(" - bye</span>"));
    }

    #[test]
    fn test_level_decorations() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        logger.debug("step 1");
        logger.warning("slow");
        logger.info("<b>not bold</b>");
        logger.flush();

        let content = content(&logger);
        assert!(content.contains("<font color=\"gray\">\n<span data-tags=\"debug\">"));
        assert!(content.contains(" - ## step 1</span>"));
        assert!(content.contains("<font color=\"gold\">\n<span data-tags=\"warning\">"));
        assert!(content.contains(" - ⚠️ slow</span>"));
        assert!(content.contains(" - &lt;b&gt;not bold&lt;/b&gt;</span>"));
    }

    #[test]
    fn test_tag_color_mapping_and_override() {
        let temp = TempDir::new().unwrap();
        let logger = HtmlLogger::new(
            LoggerConfig::new(temp.path().join("logs")).with_tag_color("database", "cyan"),
        )
        .unwrap();
        logger.info_with("query", None, "database");
        logger.info_with("override", Some("#ff00ff"), "database");
        logger.flush();

        let content = content(&logger);
        assert!(content.contains("<font color=\"cyan\">\n<span data-tags=\"database\">"));
        assert!(content.contains("<font color=\"#ff00ff\">"));
    }

    #[test]
    fn test_used_tags_sorted_and_deduplicated() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        logger.log_with("x", None, ["a", "b"]);
        logger.log_with("y", None, ["b", "c"]);

        assert_eq!(logger.get_used_tags(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_report_exception_with_delay_blocks() {
        #[derive(Debug)]
        struct Inner;
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "disk <full>")
            }
        }
        impl StdError for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "save failed")
            }
        }
        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        let start = std::time::Instant::now();
        logger.report_exception(&Outer(Inner), Some(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
        logger.flush();

        let content = content(&logger);
        assert!(content.contains("<span data-tags=\"exception\">"));
        assert!(content.contains("**** Exception: <code>Exception in thread"));
        assert!(content.contains("save failed"));
        assert!(content.contains("Caused by: disk &lt;full&gt;"));
        assert_eq!(logger.get_used_tags(), vec!["exception"]);
    }

    #[test]
    fn test_close_finalizes_and_ignores_later_calls() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp);
        logger.info("last words");
        logger.close();
        logger.close();
        logger.info("too late");
        logger.flush();

        let content = content(&logger);
        assert!(logger.is_closed());
        assert!(content.contains("last words"));
        assert!(!content.contains("too late"));
        assert!(content.ends_with(FOOTER));
    }

    #[test]
    fn test_drop_closes_document() {
        let temp = TempDir::new().unwrap();
        let path = {
            let logger = logger(&temp);
            logger.info("dropped without close");
            logger.path()
        };

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("dropped without close"));
        assert!(content.ends_with(FOOTER));
    }

    #[test]
    fn test_periodic_flush_without_explicit_call() {
        let temp = TempDir::new().unwrap();
        let logger = HtmlLogger::new(
            LoggerConfig::new(temp.path().join("logs"))
                .with_buffer_size(1000)
                .with_flush_interval(Duration::from_millis(20)),
        )
        .unwrap();
        logger.info("eventually visible");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !content(&logger).contains("eventually visible") {
            assert!(std::time::Instant::now() < deadline, "periodic flush never happened");
            thread::sleep(Duration::from_millis(10));
        }
    }
}
