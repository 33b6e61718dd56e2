//! epd-sync Binary
//!
//! Runs the sync loop against an image server, writing rendered frames to a
//! directory in place of a panel.

use std::time::Duration;

use clap::Parser;
use epd_sync::display::FileDisplay;
use epd_sync::link::HostLinkWatcher;
use epd_sync::{Config, SyncLoop};
use tracing_subscriber::{fmt, EnvFilter};

/// epd-sync
#[derive(Parser, Debug)]
#[command(name = "epd-sync")]
#[command(about = "Poll an image server and render its frames")]
#[command(version)]
struct Args {
    /// Image server host
    #[arg(short = 'H', long, default_value = "192.168.1.15")]
    host: String,

    /// Image server port
    #[arg(short, long, default_value = "18888")]
    port: u16,

    /// Directory receiving rendered frames
    #[arg(short, long, default_value = "./epd_frames")]
    output_dir: String,

    /// Seconds between cycles
    #[arg(short, long, default_value = "180")]
    interval_secs: u64,

    /// Max frame size in bytes
    #[arg(long, default_value = "120000")]
    image_capacity: usize,

    /// Max text reply size in bytes
    #[arg(long, default_value = "1024")]
    response_capacity: usize,

    /// Text command timeout in milliseconds
    #[arg(long, default_value = "5000")]
    command_timeout_ms: u64,

    /// Frame receive timeout in milliseconds
    #[arg(long, default_value = "10000")]
    frame_timeout_ms: u64,

    /// Seconds the panel is given to refresh before sleeping
    #[arg(long, default_value = "30")]
    settle_secs: u64,

    /// Startup link polls (one per second) before giving up
    #[arg(long, default_value = "30")]
    link_polls: u32,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,epd_sync=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("epd-sync v{}", epd_sync::VERSION);
    tracing::info!("Server: {}:{}", args.host, args.port);
    tracing::info!("Output directory: {}", args.output_dir);

    // Build config from args
    let config = Config::builder()
        .server_host(&args.host)
        .server_port(args.port)
        .cycle_interval(Duration::from_secs(args.interval_secs))
        .image_capacity(args.image_capacity)
        .response_capacity(args.response_capacity)
        .command_recv_timeout_ms(args.command_timeout_ms)
        .send_timeout_ms(args.command_timeout_ms)
        .frame_recv_timeout_ms(args.frame_timeout_ms)
        .refresh_settle(Duration::from_secs(args.settle_secs))
        .link_wait_polls(args.link_polls)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let link = match HostLinkWatcher::spawn(config.endpoint(), config.link_poll_interval) {
        Ok(link) => link,
        Err(e) => {
            tracing::error!("Failed to start link watcher: {}", e);
            std::process::exit(1);
        }
    };

    let display = FileDisplay::new(&args.output_dir);

    let mut sync = match SyncLoop::new(config, link, display) {
        Ok(sync) => sync,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Only returns on a failed startup link wait
    if let Err(e) = sync.run() {
        tracing::error!("Sync loop stopped: {}", e);
        std::process::exit(1);
    }
}
