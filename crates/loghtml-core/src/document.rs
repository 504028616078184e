//! Byte-level layout of a log document.
//!
//! ```text
//! <template header>                 written once at creation
//! <font color="blue">               opened when the color changes
//! <span data-tags="db">...</span>
//! </font>
//! <font color="red">
//! <span data-tags="error">...</span>
//! <!-- LOG_CONTENT -->              marker-insert mode only
//! </font>                           closing markup: open block (if any)
//! <!-- CONTAINER_END -->            + footer
//! </div>
//! </body>
//! </html>
//! ```
//!
//! In append mode nothing follows the last line until the document is
//! finalized. In marker-insert mode the sentinel and the closing markup form
//! a reserved trailing region that is rewritten on every insertion.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Logical insertion point in marker-insert mode.
pub const SENTINEL: &str = "<!-- LOG_CONTENT -->";

/// First line of the footer.
pub const CONTAINER_END: &str = "<!-- CONTAINER_END -->";

/// Closing document skeleton.
pub const FOOTER: &str = "<!-- CONTAINER_END -->\n</div>\n</body>\n</html>\n";

/// Closes the current color block.
pub const FONT_CLOSE: &str = "</font>\n";

/// Written into the document by an external party to request filter mode.
pub const FILTER_ON_SIGNAL: &str = "<!-- LOGHTML:FILTER_ON -->";

/// Written into the document by an external party to leave filter mode.
pub const FILTER_OFF_SIGNAL: &str = "<!-- LOGHTML:FILTER_OFF -->";

const FONT_OPEN_PREFIX: &str = "<font color=\"";

/// Opening tag of a color block. `color` must already be attribute-escaped.
pub fn font_open(color: &str) -> String {
    format!("{FONT_OPEN_PREFIX}{color}\">\n")
}

/// Markup that turns the current content into a complete document.
pub fn closing_markup(open_block: bool) -> String {
    let mut out = String::with_capacity(FONT_CLOSE.len() + FOOTER.len());
    if open_block {
        out.push_str(FONT_CLOSE);
    }
    out.push_str(FOOTER);
    out
}

/// Sentinel followed by the closing markup.
pub fn marker_region(open_block: bool) -> String {
    format!("{SENTINEL}\n{}", closing_markup(open_block))
}

/// An active document opened for writing.
#[derive(Debug)]
pub struct OpenedDocument {
    pub file: File,
    /// Attribute-escaped color of a block left open at the end of the content.
    pub open_color: Option<String>,
    /// Bytes of log content after the template header.
    pub content_len: u64,
    /// Whether the file was created by this call.
    pub created: bool,
}

/// Open the document at `path`, creating it with `header` if it is missing or
/// empty.
///
/// An existing document is trimmed back to its last log line: a trailing
/// footer and a stale sentinel region are removed so appending resumes in
/// the right place.
pub fn open(path: &Path, header: &str) -> io::Result<OpenedDocument> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)?;

    if content.is_empty() {
        file.write_all(header.as_bytes())?;
        return Ok(OpenedDocument {
            file,
            open_color: open_block_color(header.as_bytes()),
            content_len: 0,
            created: true,
        });
    }

    let end = content_end(&content);
    if end < content.len() {
        file.set_len(end as u64)?;
    }
    file.seek(SeekFrom::End(0))?;
    let content = &content[..end];

    let content_len = if content.starts_with(header.as_bytes()) {
        content.len() - header.len()
    } else {
        content.len()
    };

    Ok(OpenedDocument {
        file,
        open_color: open_block_color(content),
        content_len: content_len as u64,
        created: false,
    })
}

/// Create (or truncate) the document at `path` with only the header.
pub fn create(path: &Path, header: &str) -> io::Result<OpenedDocument> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(header.as_bytes())?;
    Ok(OpenedDocument {
        file,
        open_color: open_block_color(header.as_bytes()),
        content_len: 0,
        created: true,
    })
}

/// Append `bytes` at the physical end of the file.
pub fn append(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::End(0))?;
    file.write_all(bytes)
}

/// Check that the sentinel starts at `offset`.
pub fn sentinel_at(file: &mut File, offset: u64) -> io::Result<bool> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; SENTINEL.len()];
    match file.read_exact(&mut buf) {
        Ok(()) => Ok(buf == SENTINEL.as_bytes()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Write `fragment` at `offset` (where the sentinel currently starts),
/// followed by a fresh marker region. Returns the new sentinel offset.
pub fn splice_before_marker(
    file: &mut File,
    offset: u64,
    fragment: &[u8],
    open_block: bool,
) -> io::Result<u64> {
    let region = marker_region(open_block);
    let mut buf = Vec::with_capacity(fragment.len() + region.len());
    buf.extend_from_slice(fragment);
    buf.extend_from_slice(region.as_bytes());

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&buf)?;
    file.set_len(offset + buf.len() as u64)?;
    Ok(offset + fragment.len() as u64)
}

/// Everything from `start` to the end of the file. Empty when `start` is at
/// or past the end.
pub fn read_from(file: &mut File, start: u64) -> io::Result<Vec<u8>> {
    let len = file.seek(SeekFrom::End(0))?;
    if start >= len {
        return Ok(Vec::new());
    }
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Length of `content` once a trailing footer and sentinel region are cut.
pub fn content_end(content: &[u8]) -> usize {
    let mut end = content.len();
    if let Some(pos) = rfind(&content[..end], CONTAINER_END.as_bytes()) {
        if is_closing_markup(&content[pos + CONTAINER_END.len()..end]) {
            end = pos;
        }
    }
    if let Some(pos) = rfind(&content[..end], SENTINEL.as_bytes()) {
        if is_closing_markup(&content[pos + SENTINEL.len()..end]) {
            end = pos;
        }
    }
    // A finalized document closes its last block before the footer; that
    // `</font>` belongs to the content and is kept.
    end
}

/// Attribute value of a `<font color="...">` block that is still open at the
/// end of `content`.
pub fn open_block_color(content: &[u8]) -> Option<String> {
    let open = rfind(content, FONT_OPEN_PREFIX.as_bytes())?;
    if let Some(close) = rfind(content, FONT_CLOSE.trim_end().as_bytes()) {
        if close > open {
            return None;
        }
    }
    let value = &content[open + FONT_OPEN_PREFIX.len()..];
    let quote = value.iter().position(|&b| b == b'"')?;
    Some(String::from_utf8_lossy(&value[..quote]).into_owned())
}

/// All tags referenced by `data-tags` attributes in a document.
pub fn used_tags(content: &str) -> BTreeSet<String> {
    const ATTR: &str = "data-tags=\"";
    let mut tags = BTreeSet::new();
    let mut rest = content;
    while let Some(start) = rest.find(ATTR) {
        rest = &rest[start + ATTR.len()..];
        let Some(end) = rest.find('"') else { break };
        for tag in rest[..end].split(',') {
            let tag = tag.trim();
            if !tag.is_empty() {
                tags.insert(unescape_attr(tag));
            }
        }
        rest = &rest[end..];
    }
    tags
}

/// Inverse of `record::escape_attr` for the entities it produces.
fn unescape_attr(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn is_closing_markup(rest: &[u8]) -> bool {
    let text = String::from_utf8_lossy(rest);
    let mut rest: &str = &text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return true;
        }
        // Filter signals appended after the footer are consumed on reopen.
        match ["</font>", "</div>", "</body>", "</html>", FILTER_ON_SIGNAL, FILTER_OFF_SIGNAL]
            .iter()
            .find(|tag| rest.starts_with(*tag))
        {
            Some(tag) => rest = &rest[tag.len()..],
            None => return false,
        }
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
