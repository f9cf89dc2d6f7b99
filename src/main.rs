//! This file defines the expressionist binary entry point.

use expressionist::app;
use expressionist::cli;
use expressionist::metrics;
use expressionist::server;
use expressionist::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    println!("{:?}", args);
    tracing::init_tracing();
    metrics::register_metrics();
    app::init(&args);
    let service = app::service(&args);
    server::serve(&args, service).await;
}
