//! Stress tests for concurrent logging
//!
//! These tests hammer one logger from many threads and check that the
//! resulting document is complete, ordered per thread and well-formed.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use loghtml_core::document::{FOOTER, SENTINEL};
use loghtml_core::{HtmlLogger, LoggerConfig};
use tempfile::TempDir;

fn logger(temp: &TempDir) -> Arc<HtmlLogger> {
    Arc::new(HtmlLogger::new(LoggerConfig::new(temp.path().join("logs"))).unwrap())
}

/// Message bodies in document order.
fn messages(content: &str) -> Vec<&str> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.strip_suffix("</span>")?;
            let (_, message) = line.split_once(" - ")?;
            Some(message)
        })
        .collect()
}

fn assert_well_formed(content: &str) {
    assert_eq!(
        content.matches("<font color=").count(),
        content.matches("</font>").count(),
        "unbalanced color blocks"
    );
    assert_eq!(content.matches(FOOTER).count(), 1);
    assert!(content.ends_with(FOOTER));
    assert!(!content.contains(SENTINEL));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// 8 threads x 250 records, mixed colors
#[test]
fn test_concurrent_writers_lose_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let temp = TempDir::new().unwrap();
    let logger = logger(&temp);

    let start = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let color = if i % 3 == 0 { "blue" } else { "green" };
                    logger.log_with(format!("t{t}-{i}"), Some(color), format!("thread{t}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    logger.close();
    let duration = start.elapsed();

    let content = std::fs::read_to_string(logger.path()).unwrap();
    assert_well_formed(&content);

    let messages = messages(&content);
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    let unique: HashSet<_> = messages.iter().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);

    // Per-thread call order survives the queue.
    for t in 0..THREADS {
        let prefix = format!("t{t}-");
        let order: Vec<usize> = messages
            .iter()
            .filter_map(|m| m.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
    }

    assert_eq!(logger.get_used_tags().len(), THREADS);

    println!(
        "Wrote {} records from {} threads in {:?}",
        THREADS * PER_THREAD,
        THREADS,
        duration
    );
}

/// Filter-mode switches interleaved with writes from other threads
#[test]
fn test_concurrent_writes_with_filter_toggling() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 100;

    let temp = TempDir::new().unwrap();
    let logger = logger(&temp);

    let toggler = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            for i in 0..20 {
                if i % 2 == 0 {
                    logger.activate_filter_mode();
                } else {
                    logger.deactivate_filter_mode();
                }
                logger.flush();
            }
        })
    };
    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    if i % 10 == 0 {
                        logger.error(format!("t{t}-{i}"));
                    } else {
                        logger.info(format!("t{t}-{i}"));
                    }
                }
            })
        })
        .collect();

    toggler.join().unwrap();
    for handle in writers {
        handle.join().unwrap();
    }
    logger.close();

    let content = std::fs::read_to_string(logger.path()).unwrap();
    assert_well_formed(&content);

    let messages: HashSet<String> = messages(&content)
        .into_iter()
        .map(|m| m.trim_start_matches("**** ").to_string())
        .collect();
    assert_eq!(messages.len(), THREADS * PER_THREAD);
}

/// Readers see a well-formed document between flushes in filter mode
#[test]
fn test_marker_mode_document_is_closed_after_every_flush() {
    let temp = TempDir::new().unwrap();
    let logger = logger(&temp);
    logger.activate_filter_mode();

    for batch in 0..20 {
        for i in 0..10 {
            let color = if (batch + i) % 2 == 0 { "white" } else { "red" };
            logger.log_with(format!("b{batch}-{i}"), Some(color), "log");
        }
        logger.flush();

        let content = std::fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.matches(SENTINEL).count(), 1);
        assert!(content.ends_with(FOOTER));
        assert_eq!(
            content.matches("<font color=").count(),
            content.matches("</font>").count()
        );
    }

    logger.close();
}
