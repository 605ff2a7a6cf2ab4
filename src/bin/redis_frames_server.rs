//! redis-frames-server - Unix socket front end for the frame translator
//!
//! Usage:
//!   redis-frames-server [--socket /tmp/redis-frames.sock] [--redis 127.0.0.1:6379]
//!                       [--timeout-ms 5000] [--log-level info]
//!
//! Protocol: see `redis_frames::server`.

use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use redis_frames::config::Config;
use redis_frames::server::handle_connection;
use redis_frames::TcpClient;

static NEXT_CONN_ID: AtomicUsize = AtomicUsize::new(1);

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting redis-frames-server");

    let client = TcpClient::connect(&config.redis, config.timeout())
        .with_context(|| format!("failed to connect to store at {}", config.redis))?;
    let client = Arc::new(client);
    info!(addr = %client.addr(), "connected to store");

    // Remove stale socket file
    let _ = std::fs::remove_file(&config.socket);
    let listener = UnixListener::bind(&config.socket)
        .with_context(|| format!("failed to bind {}", config.socket.display()))?;
    info!(socket = %config.socket.display(), "listening");

    let socket_for_signal = config.socket.clone();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ])
    .context("failed to register signal handlers")?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "shutting down");
            let _ = std::fs::remove_file(&socket_for_signal);
            std::process::exit(0);
        }
    });

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::SeqCst);
                let client = Arc::clone(&client);
                let spawned = thread::Builder::new()
                    .name(format!("conn-{}", conn_id))
                    .spawn(move || handle_connection(stream, client.as_ref(), conn_id));
                if let Err(e) = spawned {
                    error!(conn_id, error = %e, "failed to spawn connection thread");
                }
            }
            Err(e) => {
                warn!(error = %e, "accept error");
            }
        }
    }

    Ok(())
}
