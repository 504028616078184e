//! Rotation and retention scenarios through the public API.

use std::fs;

use loghtml_core::document::{FOOTER, SENTINEL};
use loghtml_core::{HtmlLogger, HtmlWriter, LogRecord, LoggerConfig, Tags};
use tempfile::TempDir;

fn small_config(temp: &TempDir, max_size: u64, max_files: usize) -> LoggerConfig {
    LoggerConfig::new(temp.path().join("logs"))
        .with_max_size(max_size)
        .with_max_files(max_files)
        .with_buffer_size(1)
}

// ============================================================================
// Threshold Scenarios
// ============================================================================

/// Three ~60 byte records with max_size=100 and max_files=2
#[test]
fn test_third_record_lands_in_fresh_document() {
    let temp = TempDir::new().unwrap();
    let logger = HtmlLogger::new(small_config(&temp, 100, 2)).unwrap();

    for _ in 0..3 {
        logger.error("ERR");
    }
    logger.close();

    let policy = logger.writer().rotation_policy();
    let rotated = policy.rotated_files().unwrap();
    assert_eq!(rotated.len(), 1);

    let archived = fs::read_to_string(&rotated[0]).unwrap();
    assert_eq!(archived.matches(" - **** ERR</span>").count(), 2);
    assert!(archived.ends_with(FOOTER));

    let active = fs::read_to_string(logger.path()).unwrap();
    assert_eq!(active.matches(" - **** ERR</span>").count(), 1);
    assert!(active.starts_with("<!DOCTYPE html>"));
}

/// K rotations with max_files=F leave exactly F archives, the newest ones
#[test]
fn test_retention_after_many_rotations() {
    const ROTATIONS: usize = 7;
    const KEEP: usize = 3;

    let temp = TempDir::new().unwrap();
    let writer = HtmlWriter::new(small_config(&temp, 1, KEEP)).unwrap();

    // With max_size=1 every record after the first rotates first.
    for i in 0..=ROTATIONS {
        writer.write(&LogRecord::new(format!("record {i}"), "white", Tags::from("log")));
    }
    writer.close();

    let rotated = writer.rotation_policy().rotated_files().unwrap();
    assert_eq!(rotated.len(), KEEP);

    for (archive, i) in rotated.iter().zip(ROTATIONS - KEEP..ROTATIONS) {
        let content = fs::read_to_string(archive).unwrap();
        assert!(content.contains(&format!(" - record {i}</span>")), "{}", archive.display());
        assert!(content.ends_with(FOOTER));
    }

    let active = fs::read_to_string(writer.path()).unwrap();
    assert!(active.contains(&format!(" - record {ROTATIONS}</span>")));
}

/// Nothing is split across the boundary: every record is in exactly one file
#[test]
fn test_records_never_split_across_documents() {
    let temp = TempDir::new().unwrap();
    let logger = HtmlLogger::new(small_config(&temp, 400, 50)).unwrap();

    for i in 0..60 {
        logger.info_with(format!("line {i:03}"), None, ["a", "b"]);
    }
    logger.close();

    let mut files = logger.writer().rotation_policy().rotated_files().unwrap();
    files.push(logger.path());
    assert!(files.len() > 2);

    let mut seen = Vec::new();
    for file in &files {
        let content = fs::read_to_string(file).unwrap();
        assert!(content.ends_with(FOOTER));
        assert_eq!(
            content.matches("<font color=").count(),
            content.matches("</font>").count()
        );
        assert!(!content.contains("data-tags=\"info\""));
        for i in 0..60 {
            if content.contains(&format!(" - line {i:03}</span>")) {
                seen.push(i);
            }
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..60).collect::<Vec<_>>());
}

// ============================================================================
// Filter Mode Across Rotation
// ============================================================================

#[test]
fn test_filter_mode_survives_rotation() {
    let temp = TempDir::new().unwrap();
    let logger = HtmlLogger::new(small_config(&temp, 200, 5)).unwrap();
    logger.activate_filter_mode();

    for i in 0..10 {
        logger.warning(format!("w{i}"));
    }
    logger.flush();

    let active = fs::read_to_string(logger.path()).unwrap();
    assert_eq!(active.matches(SENTINEL).count(), 1);
    assert!(active.ends_with(FOOTER));

    for archive in logger.writer().rotation_policy().rotated_files().unwrap() {
        let content = fs::read_to_string(archive).unwrap();
        assert!(!content.contains(SENTINEL));
        assert!(content.ends_with(FOOTER));
    }
    logger.close();
}

#[test]
fn test_explicit_rotate_archives_current_content() {
    let temp = TempDir::new().unwrap();
    let logger = HtmlLogger::new(LoggerConfig::new(temp.path().join("logs"))).unwrap();
    logger.info("before");
    logger.rotate();
    logger.info("after");
    logger.close();

    let rotated = logger.writer().rotation_policy().rotated_files().unwrap();
    assert_eq!(rotated.len(), 1);
    assert!(fs::read_to_string(&rotated[0]).unwrap().contains(" - before</span>"));

    let active = fs::read_to_string(logger.path()).unwrap();
    assert!(!active.contains("before"));
    assert!(active.contains(" - after</span>"));
}
