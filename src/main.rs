use anyhow::Result;
use clap::Parser;
use server::ServerConfig;
use std::time::Duration;
use tracing::Level;

mod server;

/// Websocket echo server
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9023")]
    ip: String,

    /// Send each message to every connected client instead of echoing it back
    #[arg(short, long)]
    broadcast: bool,

    /// Largest accepted frame payload (in bytes)
    #[arg(long, default_value_t = 1 << 20)]
    max_frame_size: usize,

    /// Seconds a write to a client may block before it is dropped (0 = no limit)
    #[arg(long, default_value_t = 5)]
    write_timeout: u64,

    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();
    tracing::debug!(?args, "parsed args");

    server::start_server(
        &args.ip,
        ServerConfig {
            broadcast: args.broadcast,
            max_frame_size: args.max_frame_size,
            write_timeout: (args.write_timeout > 0)
                .then(|| Duration::from_secs(args.write_timeout)),
        },
    )
}
