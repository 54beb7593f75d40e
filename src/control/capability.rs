//! Control capability surface

use std::path::PathBuf;

use crate::audio::AudioDeviceInfo;
use crate::capture::{SessionPreset, WhiteBalanceMode, WhiteBalanceReading};
use crate::error::Result;
use crate::profile::DeviceProfile;
use crate::render::BokehParams;

/// Everything the control plane can ask of the engine
///
/// Methods are synchronous; route handlers move the blocking ones onto the
/// blocking pool. Each route invokes exactly one method.
pub trait ControlCapabilities: Send + Sync {
    /// Capability snapshots for all attached cameras
    fn camera_profiles(&self) -> Vec<DeviceProfile>;

    /// Capability snapshot of the active camera
    fn active_camera(&self) -> DeviceProfile;

    /// Switch capture to the camera with this unique id
    fn select_camera(&self, unique_id: &str) -> Result<()>;

    fn set_zoom(&self, factor: f64) -> Result<()>;

    fn set_exposure_bias(&self, bias: f64) -> Result<()>;

    /// Current white balance reading of the active camera
    fn white_balance(&self) -> WhiteBalanceReading;

    fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> Result<()>;

    fn set_white_balance_temp_tint(&self, temperature: f64, tint: f64) -> Result<()>;

    fn lock_grey_white_balance(&self) -> Result<()>;

    /// Move the focus point of interest, normalized coordinates
    fn set_focus_point(&self, x: f64, y: f64) -> Result<()>;

    fn set_frame_rate(&self, fps: f64) -> Result<()>;

    fn set_preset(&self, preset: SessionPreset) -> Result<()>;

    /// True while network distribution is active
    fn streaming_started(&self) -> bool;

    fn user_start_streaming(&self);

    fn user_stop_streaming(&self);

    /// Begin recording to a fresh local file
    fn start_recording(&self) -> Result<()>;

    /// Finish the active recording and return the file path (blocks on the
    /// writer flush)
    fn stop_recording(&self) -> Result<PathBuf>;

    fn audio_inputs(&self) -> Result<Vec<AudioDeviceInfo>>;

    fn current_audio_input(&self) -> Result<Option<AudioDeviceInfo>>;

    fn select_audio_input(&self, uid: &str) -> Result<()>;

    fn audio_outputs(&self) -> Result<Vec<AudioDeviceInfo>>;

    fn current_audio_output(&self) -> Result<Option<AudioDeviceInfo>>;

    /// Replace the outgoing video filter; `None` disables it
    fn set_bokeh(&self, params: Option<BokehParams>) -> Result<()>;
}
