use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_tracing() {
    // SCREENMATES_LOG wins over RUST_LOG so the app can be tuned without
    // touching other tools sharing the shell
    let filter = std::env::var("SCREENMATES_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_logging = std::env::var("SCREENMATES_LOG_FILE").ok();
    if let Some(log_path) = file_logging {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
                // A second init (tests, embedding hosts) keeps the first subscriber
                let _ = registry.with(file_layer).try_init();
            }
            Err(e) => {
                let _ = registry.try_init();
                tracing::warn!("could not open log file {}: {}", log_path, e);
            }
        }
    } else {
        let _ = registry.try_init();
    }
}
