use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use imgfs::config::{init_logging, ServerConfig};
use imgfs::service::ImgfsService;
use imgfs::ImgFs;

#[tokio::main]
async fn main() {
    init_logging();
    let config = ServerConfig::parse();

    if let Err(err) = run(config).await {
        error!(error = %err, "Server stopped");
        std::process::exit(1);
    }
}

/// Open the store, serve until Ctrl-C, then close the store
async fn run(config: ServerConfig) -> imgfs::Result<()> {
    let store = ImgFs::open(&config.store)?;
    print!("{}", store.header());

    let service = Arc::new(ImgfsService::new(store, config.port, config.index.clone()));
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;

    tokio::select! {
        result = imgfs::http::serve(listener, Arc::clone(&service)) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    // Open connections keep their own reference. Their threads end with the
    // process; every store write is already flushed when it returns.
    match Arc::try_unwrap(service) {
        Ok(service) => service.into_store()?.close()?,
        Err(_) => info!("Connections still open, exiting without waiting for them"),
    }

    info!(store = %config.store.display(), "✅ Server shut down");
    Ok(())
}
