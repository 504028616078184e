//! loghtml demo
//!
//! Simulates a small service whose components log concurrently into one live
//! HTML document. Open the printed path in a browser while it runs.
//!
//! `HtmlLogger` is synchronous: a call blocks while the queue is full, and
//! flush, filter switches and close wait for the writer thread. The async
//! components therefore make their calls on tokio's blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use loghtml_core::{HtmlLayer, HtmlLogger, LoggerConfig};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// loghtml demo - concurrent components writing one live HTML log
#[derive(Parser, Debug)]
#[command(name = "loghtml-demo")]
#[command(about = "Simulated service logging into a live HTML document")]
struct Args {
    /// Directory for the log documents
    #[arg(short, long, default_value = "logs")]
    log_dir: PathBuf,

    /// JSON logger configuration (overrides --log-dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long to run, in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    /// Start in filter mode
    #[arg(short, long)]
    filter: bool,
}

/// Base interval with +-50% jitter.
fn jitter(base_ms: u64) -> Duration {
    Duration::from_millis(rand::rng().random_range(base_ms / 2..=base_ms * 3 / 2))
}

/// Run a logger call on the blocking pool and wait for it.
async fn blocking<F>(logger: &Arc<HtmlLogger>, call: F)
where
    F: FnOnce(&HtmlLogger) + Send + 'static,
{
    let logger = Arc::clone(logger);
    if let Err(e) = tokio::task::spawn_blocking(move || call(&logger)).await {
        warn!(error = %e, "Logger call did not complete");
    }
}

async fn database(logger: Arc<HtmlLogger>) {
    let mut queries = 0u64;
    loop {
        tokio::time::sleep(jitter(300)).await;
        queries += 1;
        let elapsed = rand::rng().random_range(1..250u64);
        blocking(&logger, move |log| {
            if elapsed > 200 {
                log.warning_with(
                    format!("Slow query #{queries}: {elapsed}ms"),
                    None,
                    ["database", "perf"],
                );
            } else {
                log.log_with(format!("Query #{queries} ok in {elapsed}ms"), None, "database");
            }
        })
        .await;
    }
}

async fn auth(logger: Arc<HtmlLogger>) {
    let users = ["amy", "bo", "cy", "<script>"];
    loop {
        tokio::time::sleep(jitter(700)).await;
        let user = users[rand::rng().random_range(0..users.len())];
        let rejected = rand::rng().random_bool(0.2);
        blocking(&logger, move |log| {
            if rejected {
                log.error_with(format!("Login rejected for {user}"), None, ["auth", "security"]);
            } else {
                log.info_with(format!("User {user} logged in"), None, "auth");
            }
        })
        .await;
    }
}

async fn processing(logger: Arc<HtmlLogger>) {
    let mut batch = 0u64;
    loop {
        tokio::time::sleep(jitter(1000)).await;
        batch += 1;
        blocking(&logger, move |log| {
            log.debug_with(format!("Batch {batch} started"), None, "processing");
            // Routed into the same queue by HtmlLayer.
            info!(batch, items = batch * 17, "Batch finished");

            if batch % 5 == 0 {
                let err = anyhow::anyhow!("checksum mismatch in record 42")
                    .context(format!("batch {batch} rejected"));
                log.report_exception(&*err, Some(Duration::from_millis(100)));
            }
        })
        .await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LoggerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoggerConfig::new(&args.log_dir)
            .with_tag_color("database", "cyan")
            .with_tag_color("auth", "#7fd1ff")
            .with_tag_color("processing", "violet")
            .with_filter_signal_detection(),
    };

    let logger = Arc::new(HtmlLogger::new(config)?);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(HtmlLayer::new(Arc::clone(&logger)))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Logging to {}", logger.path().display());
    let filter = args.filter;
    blocking(&logger, move |log| {
        if filter {
            log.activate_filter_mode();
        }
        log.info_with("Demo started", Some("lime"), "system");
    })
    .await;

    let tasks = [
        tokio::spawn(database(Arc::clone(&logger))),
        tokio::spawn(auth(Arc::clone(&logger))),
        tokio::spawn(processing(Arc::clone(&logger))),
    ];

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
    }

    for task in &tasks {
        task.abort();
    }
    blocking(&logger, |log| {
        log.info_with("Demo finished", Some("lime"), "system");
        println!("Tags used: {}", log.get_used_tags().join(", "));
        log.close();
    })
    .await;

    Ok(())
}
