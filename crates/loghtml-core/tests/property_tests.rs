//! Property-based tests for the HTML writer
//!
//! Uses proptest to drive random sequences of writes, mode switches and
//! flushes, then checks the document invariants.

use loghtml_core::document::{FOOTER, SENTINEL};
use loghtml_core::record::escape_attr;
use loghtml_core::{escape_html, HtmlWriter, InsertionMode, LogRecord, LoggerConfig, TagIndex, Tags};
use proptest::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Strategy Generators
// ============================================================================

fn color_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["white", "red", "blue", "#00ff00"]).prop_map(str::to_string)
}

/// Operations that can be performed on a writer
#[derive(Debug, Clone)]
enum WriterOp {
    Write(String),
    Activate,
    Deactivate,
    Flush,
}

fn writer_ops_strategy(max_ops: usize) -> impl Strategy<Value = Vec<WriterOp>> {
    prop::collection::vec(
        prop_oneof![
            6 => color_strategy().prop_map(WriterOp::Write),
            1 => Just(WriterOp::Activate),
            1 => Just(WriterOp::Deactivate),
            1 => Just(WriterOp::Flush),
        ],
        0..max_ops,
    )
}

fn run(ops: &[WriterOp], buffer_size: usize) -> (TempDir, String, Vec<String>) {
    let temp = TempDir::new().unwrap();
    let writer = HtmlWriter::new(
        LoggerConfig::new(temp.path().join("logs")).with_buffer_size(buffer_size),
    )
    .unwrap();

    let mut expected = Vec::new();
    for op in ops {
        match op {
            WriterOp::Write(color) => {
                let message = format!("m{}", expected.len());
                writer.write(&LogRecord::new(message.clone(), color.clone(), Tags::from("p")));
                expected.push(message);
            }
            WriterOp::Activate => writer.activate_filter_mode(),
            WriterOp::Deactivate => writer.deactivate_filter_mode(),
            WriterOp::Flush => writer.flush(),
        }
    }
    writer.close();
    let content = std::fs::read_to_string(writer.path()).unwrap();
    (temp, content, expected)
}

fn messages(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.strip_suffix("</span>")?;
            let (_, message) = line.split_once(" - ")?;
            Some(message.to_string())
        })
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any mix of writes, switches and flushes yields every record once, in order
    #[test]
    fn document_keeps_every_record_in_order(ops in writer_ops_strategy(40), buffer_size in 1usize..6) {
        let (_temp, content, expected) = run(&ops, buffer_size);
        prop_assert_eq!(messages(&content), expected);
    }

    /// The finalized document is balanced, has one footer and no sentinel
    #[test]
    fn finalized_document_is_well_formed(ops in writer_ops_strategy(40)) {
        let (_temp, content, _) = run(&ops, 1);
        prop_assert_eq!(content.matches("<font color=").count(), content.matches("</font>").count());
        prop_assert_eq!(content.matches(FOOTER).count(), 1);
        prop_assert!(content.ends_with(FOOTER));
        prop_assert!(!content.contains(SENTINEL));
    }

    /// Consecutive records of one color never open a second block
    #[test]
    fn color_blocks_are_coalesced(colors in prop::collection::vec(color_strategy(), 1..30)) {
        let ops: Vec<_> = colors.iter().cloned().map(WriterOp::Write).collect();
        let (_temp, content, _) = run(&ops, 3);

        let mut runs = colors.clone();
        runs.dedup();
        prop_assert_eq!(content.matches("<font color=").count(), runs.len());
    }

    /// In filter mode the sentinel occurs once and the skeleton follows it
    #[test]
    fn marker_mode_keeps_single_sentinel(colors in prop::collection::vec(color_strategy(), 0..20)) {
        let temp = TempDir::new().unwrap();
        let writer = HtmlWriter::new(LoggerConfig::new(temp.path().join("logs")).with_buffer_size(1)).unwrap();
        writer.activate_filter_mode();
        for color in &colors {
            writer.write(&LogRecord::new("x", color.clone(), Tags::from("p")));
            writer.activate_filter_mode();
        }
        prop_assert_eq!(writer.mode(), InsertionMode::MarkerInsert);

        let content = std::fs::read_to_string(writer.path()).unwrap();
        prop_assert_eq!(content.matches(SENTINEL).count(), 1);
        prop_assert!(content.ends_with(FOOTER));
        prop_assert_eq!(content.matches("<font color=").count(), content.matches("</font>").count());
    }

    /// Escaped text never carries markup of its own
    #[test]
    fn escaped_text_has_no_markup(text in ".{0,200}") {
        let escaped = escape_html(&text);
        let without_breaks = escaped.replace("<br>", "");
        prop_assert!(!without_breaks.contains('<'));
        prop_assert!(!without_breaks.contains('>'));
        prop_assert!(!escape_attr(&text).contains('"'));
    }

    /// The tag snapshot is sorted, unique and covers every inserted tag
    #[test]
    fn tag_snapshot_is_sorted_and_complete(tags in prop::collection::vec("[a-z]{1,8}", 0..50)) {
        let index = TagIndex::new();
        index.extend(tags.iter());
        let snapshot = index.snapshot();

        let mut expected = tags.clone();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(snapshot, expected);
    }
}
