//! Capture device interfaces
//!
//! The hardware side of the pipeline is abstracted behind two traits:
//! [`CaptureSource`] enumerates and opens devices, and [`CaptureHandle`] is
//! one open device that delivers frames and exposes the control surface the
//! control plane mutates.
//!
//! Setters on a handle follow the hardware's lock/mutate/unlock bracket: they
//! are only valid between [`CaptureHandle::lock_for_configuration`] and
//! [`CaptureHandle::unlock_for_configuration`]. The capture orchestrator owns
//! that bracketing; callers go through it rather than locking handles
//! directly.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::frame::Frame;
use crate::profile::DeviceProfile;

/// Physical placement of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePosition {
    Front,
    Back,
    External,
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DevicePosition::Front => "front",
            DevicePosition::Back => "back",
            DevicePosition::External => "external",
        };
        f.write_str(s)
    }
}

/// Identity of one capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Stable unique identifier
    pub unique_id: String,

    /// Human-readable device name
    pub name: String,

    /// Physical placement
    pub position: DevicePosition,

    /// Device type label (e.g. "wide-angle", "telephoto")
    pub device_type: String,
}

/// Criteria for selecting a capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceQuery {
    UniqueId(String),
    Position(DevicePosition),
}

impl DeviceQuery {
    /// True when the descriptor satisfies this query
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        match self {
            DeviceQuery::UniqueId(id) => descriptor.unique_id == *id,
            DeviceQuery::Position(position) => descriptor.position == *position,
        }
    }
}

impl fmt::Display for DeviceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceQuery::UniqueId(id) => write!(f, "unique id {id}"),
            DeviceQuery::Position(position) => write!(f, "position {position}"),
        }
    }
}

/// Target capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPreset {
    Hd720,
    Hd1080,
    Uhd4k,
}

impl SessionPreset {
    /// Output dimensions for this preset
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SessionPreset::Hd720 => (1280, 720),
            SessionPreset::Hd1080 => (1920, 1080),
            SessionPreset::Uhd4k => (3840, 2160),
        }
    }

    /// Route label used by the control plane
    pub fn label(&self) -> &'static str {
        match self {
            SessionPreset::Hd720 => "720p",
            SessionPreset::Hd1080 => "1080p",
            SessionPreset::Uhd4k => "4K",
        }
    }

    /// Parse a control-plane label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "720p" => Some(SessionPreset::Hd720),
            "1080p" => Some(SessionPreset::Hd1080),
            "4K" => Some(SessionPreset::Uhd4k),
            _ => None,
        }
    }
}

/// White balance control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteBalanceMode {
    ContinuousAuto,
    Locked,
}

impl WhiteBalanceMode {
    pub fn label(&self) -> &'static str {
        match self {
            WhiteBalanceMode::ContinuousAuto => "auto",
            WhiteBalanceMode::Locked => "locked",
        }
    }
}

/// Current white balance state of a device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalanceReading {
    pub mode: WhiteBalanceMode,
    pub temperature: f64,
    pub tint: f64,
}

/// Device discovery and opening
pub trait CaptureSource: Send + Sync {
    /// Enumerate the devices currently attached
    fn discover(&self) -> Vec<DeviceDescriptor>;

    /// Open a device for capture
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Arc<dyn CaptureHandle>>;

    /// Build a capability snapshot for a device without claiming it
    fn profile(&self, descriptor: &DeviceDescriptor) -> Result<DeviceProfile>;
}

/// One open capture device
pub trait CaptureHandle: Send + Sync {
    /// Identity of this device
    fn descriptor(&self) -> DeviceDescriptor;

    /// Wait up to `timeout` for the next frame
    ///
    /// Returns `Ok(None)` when the timeout elapses without a frame.
    fn next_frame(&self, timeout: Duration) -> Result<Option<Frame>>;

    /// Begin a configuration bracket
    fn lock_for_configuration(&self) -> Result<()>;

    /// End a configuration bracket
    fn unlock_for_configuration(&self);

    /// Capability snapshot built from live device state
    fn profile(&self) -> DeviceProfile;

    /// Current zoom factor
    fn zoom_factor(&self) -> f64;

    /// Set the zoom factor (requires the configuration lock)
    fn set_zoom_factor(&self, factor: f64) -> Result<()>;

    /// Set the exposure bias in EV (requires the configuration lock)
    fn set_exposure_bias(&self, bias: f64) -> Result<()>;

    /// Current white balance state
    fn white_balance(&self) -> WhiteBalanceReading;

    /// Switch white balance mode (requires the configuration lock)
    fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> Result<()>;

    /// Lock white balance to explicit temperature/tint gains (requires the
    /// configuration lock)
    fn set_white_balance_temp_tint(&self, temperature: f64, tint: f64) -> Result<()>;

    /// Lock white balance to a neutral grey reference (requires the
    /// configuration lock)
    fn lock_grey_white_balance(&self) -> Result<()>;

    /// Move the focus point of interest, normalized 0.0..=1.0 (requires the
    /// configuration lock)
    fn set_focus_point(&self, x: f64, y: f64) -> Result<()>;

    /// Set the target frame rate (requires the configuration lock)
    fn set_frame_rate(&self, fps: f64) -> Result<()>;

    /// Currently active resolution preset
    fn active_preset(&self) -> SessionPreset;

    /// Switch the resolution preset (requires the configuration lock)
    fn set_preset(&self, preset: SessionPreset) -> Result<()>;

    /// Enable or disable depth-map delivery (requires the configuration lock)
    fn set_depth_delivery(&self, enabled: bool) -> Result<()>;
}
