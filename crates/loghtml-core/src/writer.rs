//! The writer that owns the active HTML document.
//!
//! All state lives behind one mutex: the file handle, the open color block,
//! the byte counter, buffered lines, and the insertion mode. Every public
//! operation holds the lock for its whole duration, so rotation, mode
//! switches and writes never interleave.
//!
//! ## Insertion modes
//!
//! - [`InsertionMode::Append`]: lines go to the physical end of the file and
//!   the document is only closed by [`HtmlWriter::close`].
//! - [`InsertionMode::MarkerInsert`]: the document always ends with the
//!   sentinel comment and closing markup. New lines are written at the
//!   sentinel's byte offset (tracked in memory) and the short trailing region
//!   is rewritten behind them.
//!
//! ## Failure handling
//!
//! Nothing here returns an error to the caller once the writer exists. A
//! failed write drops the affected lines, reports on the `tracing` channel
//! and resets the handle so the next call reopens the document (recreating
//! the log directory if it disappeared).

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::LoggerConfig;
use crate::document::{self, font_open, FONT_CLOSE};
use crate::error::{LogError, LogResult};
use crate::record::{escape_attr, LogRecord};
use crate::rotation::RotationPolicy;
use crate::signal::{FilterRequest, FilterSignalWatch};
use crate::tags::TagIndex;
use crate::template::{BuiltinTemplate, FileTemplate, TemplateProvider};

/// Where new lines are placed in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertionMode {
    /// Write at the physical end of the file.
    #[default]
    Append,
    /// Write in front of the sentinel marker.
    MarkerInsert,
}

/// Mutable writer state, guarded by the writer's mutex.
#[derive(Debug)]
struct WriterState {
    path: PathBuf,
    file: Option<File>,
    /// Attribute-escaped color of the open `<font>` block.
    last_color: Option<String>,
    /// Log bytes in the active document, including buffered ones.
    bytes_written: u64,
    pending: String,
    pending_lines: usize,
    last_flush: Instant,
    mode: InsertionMode,
    /// Byte offset of the sentinel while in marker-insert mode.
    marker_offset: u64,
    /// End of the marker region written by the writer. Anything after it was
    /// appended by someone else.
    marker_end: u64,
    closed: bool,
    signals: Option<FilterSignalWatch>,
}

/// The open handle, or [`LogError::Closed`] after a reset.
fn handle(file: &mut Option<File>) -> LogResult<&mut File> {
    file.as_mut().ok_or(LogError::Closed)
}

impl WriterState {
    fn has_open_block(&self) -> bool {
        self.last_color.is_some()
    }

    /// Render `record`, opening a new color block only when the color changes.
    fn render(&mut self, record: &LogRecord) -> String {
        let color = escape_attr(record.color());
        let mut out = String::new();
        if self.last_color.as_deref() != Some(color.as_str()) {
            if self.last_color.is_some() {
                out.push_str(FONT_CLOSE);
            }
            out.push_str(&font_open(&color));
            self.last_color = Some(color);
        }
        out.push_str(&record.render_line());
        out
    }

    /// Only signals written after the current end of the file count.
    fn rebase_signals(&mut self) {
        let (Some(signals), Some(file)) = (self.signals.as_mut(), self.file.as_ref()) else {
            return;
        };
        if let Ok(meta) = file.metadata() {
            signals.mark_seen(meta.len());
        }
    }

    /// Forget the handle; the next operation reopens the document.
    fn reset_handle(&mut self) {
        self.file = None;
        self.pending.clear();
        self.pending_lines = 0;
    }
}

/// Thread-safe writer for one live HTML log document.
///
/// # Example
///
/// ```ignore
/// let writer = HtmlWriter::new(LoggerConfig::new("./logs"))?;
/// writer.write(&LogRecord::new("hello", "white", Tags::from("log")));
/// writer.activate_filter_mode();
/// writer.close();
/// ```
pub struct HtmlWriter {
    state: Mutex<WriterState>,
    policy: RotationPolicy,
    template: Box<dyn TemplateProvider>,
    tags: Arc<TagIndex>,
    buffer_size: usize,
    flush_interval: Duration,
}

impl HtmlWriter {
    /// Validate `config`, create the log directory and open (or create) the
    /// active document.
    pub fn new(config: LoggerConfig) -> LogResult<Self> {
        let template: Box<dyn TemplateProvider> = match &config.template_file {
            Some(path) => Box::new(FileTemplate::load(path)),
            None => Box::new(BuiltinTemplate),
        };
        Self::with_template(config, template, Arc::new(TagIndex::new()))
    }

    /// Like [`HtmlWriter::new`] with an explicit template and a shared tag
    /// index.
    pub fn with_template(
        config: LoggerConfig,
        template: Box<dyn TemplateProvider>,
        tags: Arc<TagIndex>,
    ) -> LogResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.log_dir)?;

        let policy = RotationPolicy::from_config(&config);
        let path = policy.active_path();
        let opened = document::open(&path, &template.header())?;
        debug!(
            path = %path.display(),
            created = opened.created,
            content_len = opened.content_len,
            "Opened log document"
        );

        let mut state = WriterState {
            path,
            file: Some(opened.file),
            last_color: opened.open_color,
            bytes_written: opened.content_len,
            pending: String::new(),
            pending_lines: 0,
            last_flush: Instant::now(),
            mode: InsertionMode::Append,
            marker_offset: 0,
            marker_end: 0,
            closed: false,
            signals: config.filter_signal_interval.map(FilterSignalWatch::new),
        };
        state.rebase_signals();

        Ok(Self {
            state: Mutex::new(state),
            policy,
            template,
            tags,
            buffer_size: config.buffer_size,
            flush_interval: config.flush_interval,
        })
    }

    /// Path of the active document.
    pub fn path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }

    pub fn tags(&self) -> &Arc<TagIndex> {
        &self.tags
    }

    pub fn rotation_policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn mode(&self) -> InsertionMode {
        self.state.lock().mode
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Log bytes counted against the rotation threshold.
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().bytes_written
    }

    /// Append one record to the document.
    ///
    /// Rotation is checked before the record is rendered, so a record always
    /// lands entirely in one document. Ignored after [`close`](Self::close).
    pub fn write(&self, record: &LogRecord) {
        self.tags.extend(record.tags());

        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Err(e) = self.write_locked(&mut state, record) {
            warn!(path = %state.path.display(), error = %e, "Dropping log lines after write failure");
            state.reset_handle();
        }
    }

    /// Switch to marker-insert mode. No-op if already active.
    pub fn activate_filter_mode(&self) {
        let mut state = self.state.lock();
        if state.closed || state.mode == InsertionMode::MarkerInsert {
            return;
        }
        let result = self
            .ensure_open(&mut state)
            .and_then(|()| self.activate_locked(&mut state));
        if let Err(e) = result {
            warn!(path = %state.path.display(), error = %e, "Cannot enter filter mode");
            state.reset_handle();
        }
    }

    /// Return to append mode, removing the sentinel. No-op if not active.
    pub fn deactivate_filter_mode(&self) {
        let mut state = self.state.lock();
        if state.closed || state.mode == InsertionMode::Append {
            return;
        }
        let result = self
            .ensure_open(&mut state)
            .and_then(|()| self.deactivate_locked(&mut state));
        if let Err(e) = result {
            warn!(path = %state.path.display(), error = %e, "Cannot leave filter mode");
            state.reset_handle();
            // The reopen strips any sentinel left behind.
            state.mode = InsertionMode::Append;
        }
    }

    /// Write buffered lines out and sync them to disk.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Err(e) = self.flush_locked(&mut state) {
            warn!(path = %state.path.display(), error = %e, "Flush failed");
            state.reset_handle();
        }
    }

    /// Drain buffered lines if they are older than the flush interval.
    pub fn flush_if_due(&self) {
        let mut state = self.state.lock();
        if state.closed
            || state.pending.is_empty()
            || state.last_flush.elapsed() < self.flush_interval
        {
            return;
        }
        if let Err(e) = self.drain(&mut state) {
            warn!(path = %state.path.display(), error = %e, "Periodic flush failed");
            state.reset_handle();
        }
    }

    /// Archive the active document now, regardless of its size.
    pub fn rotate(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        let result = self
            .ensure_open(&mut state)
            .and_then(|()| self.rotate_locked(&mut state));
        if let Err(e) = result {
            warn!(path = %state.path.display(), error = %e, "Rotation failed");
        }
    }

    /// Finalize the document and stop accepting writes.
    ///
    /// Buffered lines are written, the sentinel is removed, the open color
    /// block and the document skeleton are closed. Errors are swallowed;
    /// calling it again is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        if let Err(e) = self.ensure_open(&mut state) {
            warn!(path = %state.path.display(), error = %e, "Cannot reopen document to finalize it");
            return;
        }
        if let Err(e) = self.finalize_locked(&mut state) {
            warn!(path = %state.path.display(), error = %e, "Cannot finalize document");
        }
        state.file = None;
    }

    fn flush_locked(&self, state: &mut WriterState) -> LogResult<()> {
        self.ensure_open(state)?;
        self.drain(state)?;
        handle(&mut state.file)?.sync_data()?;
        Ok(())
    }

    fn write_locked(&self, state: &mut WriterState, record: &LogRecord) -> LogResult<()> {
        self.ensure_open(state)?;
        self.poll_filter_signal(state);

        if self.policy.should_rotate(state.bytes_written) {
            if let Err(e) = self.rotate_locked(state) {
                warn!(path = %state.path.display(), error = %e, "Rotation failed, continuing with current document");
            }
            self.ensure_open(state)?;
        }

        let fragment = state.render(record);
        state.bytes_written += fragment.len() as u64;
        state.pending.push_str(&fragment);
        state.pending_lines += 1;

        if state.pending_lines >= self.buffer_size
            || state.last_flush.elapsed() >= self.flush_interval
        {
            self.drain(state)?;
        }
        Ok(())
    }

    /// Reopen the document after a reset, restoring marker mode if needed.
    ///
    /// The log directory is recreated if it was removed underneath us.
    fn ensure_open(&self, state: &mut WriterState) -> LogResult<()> {
        if state.file.is_some() {
            return Ok(());
        }
        std::fs::create_dir_all(self.policy.log_dir())?;
        let opened = document::open(&state.path, &self.template.header())?;
        debug!(path = %state.path.display(), created = opened.created, "Reopened log document");
        state.file = Some(opened.file);
        state.last_color = opened.open_color;
        state.bytes_written = opened.content_len;
        state.rebase_signals();
        if state.mode == InsertionMode::MarkerInsert {
            state.mode = InsertionMode::Append;
            self.activate_locked(state)?;
        }
        Ok(())
    }

    /// Write buffered lines using the current insertion strategy.
    fn drain(&self, state: &mut WriterState) -> LogResult<()> {
        state.last_flush = Instant::now();
        if state.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut state.pending);
        state.pending_lines = 0;

        match state.mode {
            InsertionMode::Append => document::append(handle(&mut state.file)?, pending.as_bytes())?,
            InsertionMode::MarkerInsert => {
                let offset = state.marker_offset;
                let region_end = state.marker_end;
                let open_block = state.has_open_block();
                let file = handle(&mut state.file)?;
                if document::sentinel_at(file, offset)? {
                    // Signals appended behind the footer must survive the splice.
                    let trailing = document::read_from(file, region_end)?;
                    let next =
                        document::splice_before_marker(file, offset, pending.as_bytes(), open_block)?;
                    if !trailing.is_empty() {
                        document::append(file, &trailing)?;
                    }
                    state.marker_offset = next;
                    state.marker_end = next + document::marker_region(open_block).len() as u64;
                } else {
                    warn!(
                        path = %state.path.display(),
                        offset,
                        "Filter sentinel missing, falling back to append mode"
                    );
                    document::append(file, pending.as_bytes())?;
                    state.mode = InsertionMode::Append;
                }
            }
        }
        Ok(())
    }

    fn activate_locked(&self, state: &mut WriterState) -> LogResult<()> {
        self.drain(state)?;
        let open_block = state.has_open_block();
        let file = handle(&mut state.file)?;
        let offset = file.metadata()?.len();
        let region = document::marker_region(open_block);
        document::append(file, region.as_bytes())?;
        state.marker_offset = offset;
        state.marker_end = offset + region.len() as u64;
        state.mode = InsertionMode::MarkerInsert;
        state.rebase_signals();
        debug!(path = %state.path.display(), offset, "Filter mode on");
        Ok(())
    }

    fn deactivate_locked(&self, state: &mut WriterState) -> LogResult<()> {
        self.drain(state)?;
        if state.mode == InsertionMode::MarkerInsert {
            let offset = state.marker_offset;
            handle(&mut state.file)?.set_len(offset)?;
        }
        state.mode = InsertionMode::Append;
        state.rebase_signals();
        debug!(path = %state.path.display(), "Filter mode off");
        Ok(())
    }

    /// Drain, drop the marker region and write the closing markup.
    fn finalize_locked(&self, state: &mut WriterState) -> LogResult<()> {
        if let Err(e) = self.drain(state) {
            warn!(path = %state.path.display(), error = %e, "Buffered lines lost while finalizing");
        }
        let open_block = state.last_color.take().is_some();
        let mode = state.mode;
        let offset = state.marker_offset;
        let file = handle(&mut state.file)?;
        if mode == InsertionMode::MarkerInsert {
            file.set_len(offset)?;
        }
        document::append(file, document::closing_markup(open_block).as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Finalize and archive the active document, then continue in a fresh
    /// one in the same insertion mode.
    fn rotate_locked(&self, state: &mut WriterState) -> LogResult<()> {
        if let Err(e) = self.finalize_locked(state) {
            warn!(path = %state.path.display(), error = %e, "Archiving an unfinalized document");
        }
        state.file = None;
        let mode = state.mode;

        let header = self.template.header();
        match self.policy.rotate(&state.path, &header) {
            Ok(rotation) => {
                state.file = Some(rotation.document.file);
                state.last_color = rotation.document.open_color;
                state.bytes_written = 0;
                state.mode = InsertionMode::Append;
                state.rebase_signals();
                if mode == InsertionMode::MarkerInsert {
                    self.activate_locked(state)?;
                }
                Ok(())
            }
            Err(e) => {
                // Keep using the old document; the reopen removes the footer
                // just written. The counter restarts so the next record does
                // not retry immediately.
                self.ensure_open(state)?;
                state.bytes_written = 0;
                Err(e)
            }
        }
    }

    /// Act on a filter signal appended since the last scan. The switch
    /// moves the scan start past the signal, so it is honored only once.
    fn poll_filter_signal(&self, state: &mut WriterState) {
        let now = Instant::now();
        let Some(signals) = state.signals.as_mut() else { return };
        if !signals.is_due(now) {
            return;
        }
        let Some(file) = state.file.as_mut() else { return };
        let request = signals.poll(file, now);

        let result = match (request, state.mode) {
            (Some(FilterRequest::Activate), InsertionMode::Append) => self.activate_locked(state),
            (Some(FilterRequest::Deactivate), InsertionMode::MarkerInsert) => {
                self.deactivate_locked(state)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            debug!(error = %e, "Ignoring failed filter-signal switch");
        }
    }
}

impl Drop for HtmlWriter {
    fn drop(&mut self) {
        self.close();
    }
}
