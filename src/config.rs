/// Server settings and logging setup
///
/// Settings come from the command line, with environment variables as
/// fallback for the optional ones.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LISTENING_PORT: u16 = 8000;

/// imgFS HTTP server
#[derive(Debug, Clone, Parser)]
#[command(name = "imgfs-server", version, about = "Serve an imgFS store over HTTP")]
pub struct ServerConfig {
    /// Path of an existing imgFS file
    pub store: PathBuf,

    /// TCP port to listen on
    #[arg(
        short,
        long,
        env = "IMGFS_PORT",
        default_value_t = DEFAULT_LISTENING_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Landing page served for `/` and `/index.html`
    #[arg(long, env = "IMGFS_INDEX", default_value = crate::service::BASE_FILE)]
    pub index: PathBuf,
}

/// Install the global tracing subscriber
///
/// Verbosity follows `RUST_LOG` and defaults to `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
