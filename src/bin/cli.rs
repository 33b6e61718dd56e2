//! epd-cli
//!
//! Command-line client for issuing single protocol commands to an image
//! server.

use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use epd_sync::network::{Endpoint, Timeouts};
use epd_sync::protocol::{
    hex_preview, run_command, Command, FrameDownloader, ImageFrame, ResponseFields,
};
use epd_sync::Config;
use tracing_subscriber::{fmt, EnvFilter};

/// epd-cli
#[derive(Parser, Debug)]
#[command(name = "epd-cli")]
#[command(about = "CLI for the e-paper image server protocol")]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "192.168.1.15:18888")]
    server: String,

    /// Receive timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Advance to the next image
    Update,

    /// Show the current image
    Info,

    /// Download the current frame
    GetC {
        /// Write the frame to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Max frame size in bytes
        #[arg(long, default_value = "120000")]
        capacity: usize,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let endpoint = match parse_endpoint(&args.server) {
        Some(endpoint) => endpoint,
        None => {
            eprintln!("Invalid server address '{}', expected host:port", args.server);
            return ExitCode::FAILURE;
        }
    };
    let timeouts = Timeouts::from_millis(args.timeout_ms, args.timeout_ms);

    let outcome = match args.command {
        Commands::Update => text_command(&endpoint, Command::Update, timeouts),
        Commands::Info => text_command(&endpoint, Command::Info, timeouts),
        Commands::GetC { output, capacity } => get_frame(&endpoint, timeouts, capacity, output),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Split `host:port`, taking the last colon so bracket-less IPv6 hosts fail
/// to parse rather than splitting wrongly
fn parse_endpoint(server: &str) -> Option<Endpoint> {
    let (host, port) = server.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || (host.contains(':') && !server.starts_with('[')) {
        return None;
    }
    Some(Endpoint::new(host, port.parse().ok()?))
}

fn text_command(endpoint: &Endpoint, command: Command, timeouts: Timeouts) -> epd_sync::Result<()> {
    let defaults = Config::default();
    let reply = run_command(endpoint, command, defaults.response_capacity, timeouts)?;

    println!("{}", reply);
    let found = ResponseFields::scan(
        reply.as_bytes(),
        &command.reply_fields(defaults.filename_max_len),
    );
    for (name, value) in found.iter() {
        println!("  {} = {:?}", name, value);
    }
    Ok(())
}

fn get_frame(
    endpoint: &Endpoint,
    timeouts: Timeouts,
    capacity: usize,
    output: Option<String>,
) -> epd_sync::Result<()> {
    let downloader = FrameDownloader::new(endpoint.clone(), timeouts);
    let mut frame = ImageFrame::with_capacity(capacity);
    let len = downloader.fetch_into(&mut frame)?;

    println!("Received {} bytes", len);
    println!("{}", hex_preview(frame.as_bytes(), 20));

    if let Some(path) = output {
        fs::write(&path, frame.as_bytes())?;
        println!("Saved to {}", path);
    }
    Ok(())
}
