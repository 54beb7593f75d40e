//! Audio device interfaces
//!
//! Audio capture mirrors the video side at a smaller scale: a source
//! enumerates input/output ports, and an open stream delivers PCM frames on
//! the orchestrator's audio worker thread.

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::frame::Frame;

/// One audio input or output port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Stable unique identifier
    pub uid: String,

    /// Human-readable port name
    pub name: String,

    /// Port type label (e.g. "builtInMic", "headsetMic", "speaker")
    pub port_type: String,
}

/// Audio device enumeration and selection
pub trait AudioSource: Send + Sync {
    /// Available input ports
    fn inputs(&self) -> Vec<AudioDeviceInfo>;

    /// Available output ports
    fn outputs(&self) -> Vec<AudioDeviceInfo>;

    /// Currently selected input, if any
    fn current_input(&self) -> Option<AudioDeviceInfo>;

    /// Currently routed output, if any
    fn current_output(&self) -> Option<AudioDeviceInfo>;

    /// Select the input port with the given uid
    fn select_input(&self, uid: &str) -> Result<()>;

    /// Open a capture stream from the current input
    fn open_stream(&self) -> Result<Box<dyn AudioStream>>;
}

/// One open audio capture stream
pub trait AudioStream: Send {
    /// Wait up to `timeout` for the next block of samples
    ///
    /// Returns `Ok(None)` when the timeout elapses without a block.
    fn next_block(&mut self, timeout: Duration) -> Result<Option<Frame>>;
}
