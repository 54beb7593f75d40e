//! camcast - live capture pipeline with an HTTP control plane
//!
//! Run with: cargo run [BIND_ADDR] [RECORDINGS_DIR]
//!
//! Examples:
//!   cargo run                              # control plane on 0.0.0.0:8080
//!   cargo run localhost:9090               # control plane on 127.0.0.1:9090
//!   cargo run 0.0.0.0:8080 /tmp/captures   # recordings under /tmp/captures
//!
//! The binary wires the engine to the synthetic device backends, so it runs
//! on any machine. Drive it with curl:
//!   curl http://localhost:8080/cameras
//!   curl http://localhost:8080/ndi/start
//!   curl http://localhost:8080/recording/start

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use camcast::source::{
    LoggingTransport, SegmentWriterFactory, SoftwareCompositor, SyntheticAudioSource,
    SyntheticCameraSource,
};
use camcast::{ControlConfig, ControlServer, Engine, EngineConfig, EngineInterfaces};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9090" -> 127.0.0.1:9090
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:8080" -> 0.0.0.0:8080
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: camcast [BIND_ADDR] [RECORDINGS_DIR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR        Control plane address (default: 0.0.0.0:8080)");
    eprintln!("  RECORDINGS_DIR   Directory for recordings (default: recordings)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  camcast                             # control plane on 0.0.0.0:8080");
    eprintln!("  camcast localhost:9090              # control plane on 127.0.0.1:9090");
    eprintln!("  camcast 0.0.0.0:8080 /tmp/captures  # recordings under /tmp/captures");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    let recordings_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("recordings"));

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camcast=info".parse()?),
        )
        .init();

    // Ensure the recordings directory exists
    if !recordings_dir.exists() {
        std::fs::create_dir_all(&recordings_dir)?;
    }

    let engine_config = EngineConfig::default().recordings_dir(recordings_dir.clone());
    let interfaces = EngineInterfaces {
        capture: Arc::new(SyntheticCameraSource::new()),
        audio: Some(Arc::new(SyntheticAudioSource::new())),
        compositor: Arc::new(SoftwareCompositor::new()),
        transport: Arc::new(LoggingTransport::new()),
        writers: Arc::new(SegmentWriterFactory::new()),
    };

    // A missing device is not fatal; the control plane still answers, with
    // 501 on every route, until a device shows up on restart.
    let engine = match Engine::new(engine_config, interfaces) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::error!(error = %e, "engine unavailable, control plane runs unattached");
            None
        }
    };

    let server = ControlServer::new(ControlConfig::with_addr(bind_addr));
    if let Some(ref engine) = engine {
        engine.start();
        server.attach(engine.clone());
    }

    println!("camcast control server");
    println!("======================");
    println!("Listening on:  http://{}", bind_addr);
    println!("Recordings in: {}", recordings_dir.display());
    println!();
    println!("Try:");
    println!("  curl http://{}/cameras", bind_addr);
    println!("  curl http://{}/ndi/start", bind_addr);
    println!("  curl http://{}/recording/start", bind_addr);
    println!();
    println!("Press Ctrl+C to stop the server...");
    println!();

    // Bind before reporting readiness so auto-start never races the socket
    let listener = TcpListener::bind(bind_addr).await?;
    if let Some(ref engine) = engine {
        engine.notify_control_listening();
    }

    // Run until Ctrl+C
    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    if let Some(engine) = engine {
        engine.stop();
    }

    Ok(())
}
