//! Engine and control server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::SessionPreset;

/// Pipeline configuration options
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Stream name announced to the transport
    pub stream_name: String,

    /// Concurrent render slots (frames in flight through the compositor)
    pub render_slots: usize,

    /// Pixel buffers preallocated per output resolution
    pub pool_capacity: usize,

    /// Directory for finished recordings
    pub recordings_dir: PathBuf,

    /// Capture resolution selected at start-up
    pub default_preset: SessionPreset,

    /// How long a capture worker waits for one frame before re-checking
    /// for shutdown
    pub frame_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_name: "camcast".to_string(),
            render_slots: 3,
            pool_capacity: 30,
            recordings_dir: PathBuf::from("recordings"),
            default_preset: SessionPreset::Hd1080,
            frame_wait: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    /// Set the stream name
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = name.into();
        self
    }

    /// Set the number of render slots
    pub fn render_slots(mut self, slots: usize) -> Self {
        self.render_slots = slots.max(1);
        self
    }

    /// Set the pixel buffer pool capacity
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity.max(1);
        self
    }

    /// Set the recordings directory
    pub fn recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    /// Set the start-up capture preset
    pub fn default_preset(mut self, preset: SessionPreset) -> Self {
        self.default_preset = preset;
        self
    }

    /// Set the per-frame capture wait
    pub fn frame_wait(mut self, wait: Duration) -> Self {
        self.frame_wait = wait;
        self
    }
}

/// Control server configuration options
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Maximum accepted request body size
    pub max_body_bytes: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 0, // Unlimited
            max_body_bytes: 64 * 1024, // 64KB
            tcp_nodelay: true,
        }
    }
}

impl ControlConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum request body size
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}
