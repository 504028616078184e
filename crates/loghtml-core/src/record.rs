//! Log records and their HTML rendering.

use chrono::{DateTime, Local};

/// Timestamp layout used in every rendered line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Caller-supplied tags for one record.
///
/// Accepts a single identifier or a collection. Entries are trimmed, empty
/// ones dropped, duplicates removed (first occurrence kept).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    /// No tags: the logger substitutes the level's default tag.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    fn push(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.0.iter().any(|t| t == tag) {
            self.0.push(tag.to_string());
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::none();
        for tag in iter {
            tags.push(tag.as_ref());
        }
        tags
    }
}

impl From<&str> for Tags {
    fn from(tag: &str) -> Self {
        std::iter::once(tag).collect()
    }
}

impl From<String> for Tags {
    fn from(tag: String) -> Self {
        Tags::from(tag.as_str())
    }
}

impl From<&String> for Tags {
    fn from(tag: &String) -> Self {
        Tags::from(tag.as_str())
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Vec<&str>> for Tags {
    fn from(tags: Vec<&str>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        tags.iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        tags.into_iter().collect()
    }
}

/// One formatted log entry, ready for the writer.
///
/// `message` is HTML: callers go through [`escape_html`] for plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    message: String,
    color: String,
    tags: Vec<String>,
}

impl LogRecord {
    /// Create a record stamped with the current local time.
    pub fn new(message_html: impl Into<String>, color: impl Into<String>, tags: Tags) -> Self {
        Self::with_timestamp(Local::now(), message_html, color, tags)
    }

    pub fn with_timestamp(
        timestamp: DateTime<Local>,
        message_html: impl Into<String>,
        color: impl Into<String>,
        tags: Tags,
    ) -> Self {
        Self {
            timestamp,
            message: message_html.into(),
            color: color.into(),
            tags: tags.into_vec(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Render the line element (without any surrounding color block).
    ///
    /// `<span data-tags="a,b">2024-01-01 00:00:00.000 - message</span>`
    pub fn render_line(&self) -> String {
        format!(
            "<span data-tags=\"{}\">{} - {}</span>\n",
            escape_attr(&self.tags.join(",")),
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

/// Escape plain text for the document body. Line breaks become `<br>`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value placed inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
