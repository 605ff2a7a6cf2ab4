//! Server configuration from command line and environment

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "redis-frames-server",
    version,
    about = "Translate Redis replies into typed frames over a Unix socket"
)]
pub struct Config {
    /// Unix socket path to listen on
    #[arg(long, env = "REDIS_FRAMES_SOCKET", default_value = "/tmp/redis-frames.sock")]
    pub socket: PathBuf,

    /// Store address (host:port)
    #[arg(long, env = "REDIS_FRAMES_ADDR", default_value = "127.0.0.1:6379")]
    pub redis: String,

    /// Read/write timeout on the store connection in milliseconds (0 = none)
    #[arg(long = "timeout-ms", env = "REDIS_FRAMES_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}
