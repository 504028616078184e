//! `tracing` Layer that forwards events into an [`HtmlLogger`].
//!
//! Events become records at the matching severity, tagged with the level tag
//! and the crate that emitted them. The library's own diagnostics
//! (`loghtml_core::*` targets) are never forwarded.

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::level::Level;
use crate::logger::HtmlLogger;
use crate::record::Tags;

const OWN_TARGET: &str = "loghtml_core";

/// A tracing Layer that writes events to the live HTML document.
pub struct HtmlLayer {
    logger: Arc<HtmlLogger>,
}

impl HtmlLayer {
    pub fn new(logger: Arc<HtmlLogger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<HtmlLogger> {
        &self.logger
    }
}

impl<S> Layer<S> for HtmlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target.starts_with(OWN_TARGET) {
            return;
        }

        let level = Level::from(metadata.level());
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut message = String::new();
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                let _ = write!(message, "[{}] ", spans.join(" > "));
            }
        }
        message.push_str(&visitor.message.unwrap_or_default());
        for (name, value) in &visitor.fields {
            let _ = write!(message, " {name}={value}");
        }

        let origin = target.split("::").next().unwrap_or(target);
        let tags = Tags::from([level.default_tag(), origin]);
        self.logger.emit(level, message, None, tags);
    }
}

/// Collects the `message` field and the remaining fields in order.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.fields.push((field.name().to_string(), buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }
}
