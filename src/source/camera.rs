//! Synthetic camera
//!
//! Two software cameras (back and front) that emit a BGRA test pattern at
//! their configured frame rate. The control surface behaves like real
//! hardware: mutations demand the configuration lock, out-of-range values are
//! rejected without side effects, and each device keeps its own settings
//! across switches.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::capture::{
    CaptureHandle, CaptureSource, DeviceDescriptor, DevicePosition, DeviceQuery, SessionPreset,
    WhiteBalanceMode, WhiteBalanceReading,
};
use crate::error::{EngineError, Result};
use crate::frame::{Frame, Orientation, PixelFormat, VideoMeta};
use crate::profile::{
    AutoFocusInfo, DepthInfo, DeviceProfile, DeviceProperties, ExposureInfo, FlashInfo, IsoInfo,
    LowLightInfo, TorchInfo, WhiteBalanceInfo, ZoomInfo,
};

const EXPOSURE_BIAS_RANGE: (f64, f64) = (-8.0, 8.0);
const FRAME_RATE_RANGE: (f64, f64) = (1.0, 120.0);

struct DeviceState {
    zoom: f64,
    exposure_bias: f64,
    white_balance: WhiteBalanceReading,
    focus_point: (f64, f64),
    frame_rate: f64,
    preset: SessionPreset,
    depth_enabled: bool,
    depth_due: bool,
    locked: bool,
    pattern: Bytes,
    depth_pattern: Option<Bytes>,
    last_frame: Option<Instant>,
}

/// One software camera
pub struct SyntheticDevice {
    descriptor: DeviceDescriptor,
    supported_presets: Vec<SessionPreset>,
    zoom_range: (f64, f64),
    depth_supported: bool,
    epoch: Instant,
    state: Mutex<DeviceState>,
}

impl SyntheticDevice {
    fn new(
        descriptor: DeviceDescriptor,
        supported_presets: Vec<SessionPreset>,
        zoom_range: (f64, f64),
        depth_supported: bool,
        seed: u8,
    ) -> Arc<Self> {
        let preset = SessionPreset::Hd1080;
        let (width, height) = preset.dimensions();
        Arc::new(Self {
            descriptor,
            supported_presets,
            zoom_range,
            depth_supported,
            epoch: Instant::now(),
            state: Mutex::new(DeviceState {
                zoom: 1.0,
                exposure_bias: 0.0,
                white_balance: WhiteBalanceReading {
                    mode: WhiteBalanceMode::ContinuousAuto,
                    temperature: 5600.0,
                    tint: 0.0,
                },
                focus_point: (0.5, 0.5),
                frame_rate: 30.0,
                preset,
                depth_enabled: false,
                depth_due: false,
                locked: false,
                pattern: test_pattern(width, height, seed),
                depth_pattern: None,
                last_frame: None,
            }),
        })
    }

    fn mutate<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut DeviceState) -> Result<()>,
    {
        let mut state = self.state.lock().unwrap();
        if !state.locked {
            return Err(EngineError::ConfigurationLockFailed(format!(
                "{} is not locked for configuration",
                self.descriptor.unique_id
            )));
        }
        mutate(&mut state)
    }
}

/// Diagonal BGRA gradient, distinct per device
fn test_pattern(width: u32, height: u32, seed: u8) -> Bytes {
    let mut data = vec![0u8; PixelFormat::Bgra32.frame_size(width, height)];
    for y in 0..height as usize {
        for x in 0..width as usize {
            let i = (y * width as usize + x) * 4;
            data[i] = (x & 0xff) as u8;
            data[i + 1] = (y & 0xff) as u8;
            data[i + 2] = ((x + y) & 0xff) as u8 ^ seed;
            data[i + 3] = 0xff;
        }
    }
    Bytes::from(data)
}

/// f32 depth ramp in meters, nearer at the top of the frame
fn depth_pattern(width: u32, height: u32) -> Bytes {
    let mut data = Vec::with_capacity(PixelFormat::Depth32.frame_size(width, height));
    for y in 0..height {
        let depth = 0.5 + 4.0 * (y as f32 / height.max(1) as f32);
        for _ in 0..width {
            data.extend_from_slice(&depth.to_le_bytes());
        }
    }
    Bytes::from(data)
}

impl CaptureHandle for SyntheticDevice {
    fn descriptor(&self) -> DeviceDescriptor {
        self.descriptor.clone()
    }

    fn next_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        // A due depth frame rides immediately behind its paced video frame.
        {
            let mut state = self.state.lock().unwrap();
            if state.depth_due {
                state.depth_due = false;
                if let Some(pattern) = state.depth_pattern.clone() {
                    let (width, height) = state.preset.dimensions();
                    return Ok(Some(Frame::video(
                        self.epoch.elapsed(),
                        pattern,
                        VideoMeta {
                            width,
                            height,
                            format: PixelFormat::Depth32,
                            orientation: Orientation::Upright,
                        },
                    )));
                }
            }
        }

        let due = {
            let state = self.state.lock().unwrap();
            let interval = Duration::from_secs_f64(1.0 / state.frame_rate);
            state.last_frame.map(|last| last + interval)
        };

        if let Some(due) = due {
            let now = Instant::now();
            if due > now {
                let wait = due - now;
                if wait > timeout {
                    thread::sleep(timeout);
                    return Ok(None);
                }
                thread::sleep(wait);
            }
        }

        let mut state = self.state.lock().unwrap();
        state.last_frame = Some(Instant::now());
        state.depth_due = state.depth_enabled;
        let (width, height) = state.preset.dimensions();
        Ok(Some(Frame::video(
            self.epoch.elapsed(),
            state.pattern.clone(),
            VideoMeta {
                width,
                height,
                format: PixelFormat::Bgra32,
                orientation: Orientation::Upright,
            },
        )))
    }

    fn lock_for_configuration(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.locked {
            return Err(EngineError::ConfigurationLockFailed(format!(
                "{} is already locked",
                self.descriptor.unique_id
            )));
        }
        state.locked = true;
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.state.lock().unwrap().locked = false;
    }

    fn profile(&self) -> DeviceProfile {
        let state = self.state.lock().unwrap();
        DeviceProfile {
            properties: DeviceProperties {
                unique_id: self.descriptor.unique_id.clone(),
                name: self.descriptor.name.clone(),
                position: self.descriptor.position.to_string(),
                device_type: self.descriptor.device_type.clone(),
                supported_presets: self
                    .supported_presets
                    .iter()
                    .map(|p| p.label().to_string())
                    .collect(),
                active_preset: state.preset.label().to_string(),
                frame_rate: state.frame_rate,
            },
            exposure: ExposureInfo {
                min_bias: EXPOSURE_BIAS_RANGE.0,
                max_bias: EXPOSURE_BIAS_RANGE.1,
                bias: state.exposure_bias,
                mode: "continuous".to_string(),
            },
            zoom: ZoomInfo {
                min: self.zoom_range.0,
                max: self.zoom_range.1,
                value: state.zoom,
            },
            auto_focus: AutoFocusInfo {
                supported: true,
                point_of_interest_supported: true,
                mode: "continuous".to_string(),
            },
            flash: FlashInfo { available: false },
            torch: TorchInfo {
                available: false,
                active: false,
                level: 0.0,
            },
            low_light: LowLightInfo {
                supported: true,
                enabled: false,
            },
            iso: IsoInfo {
                min: 32.0,
                max: 3200.0,
                value: 100.0,
            },
            white_balance: WhiteBalanceInfo {
                mode: state.white_balance.mode.label().to_string(),
                temperature: state.white_balance.temperature,
                tint: state.white_balance.tint,
                max_gain: 4.0,
                grey_lock_supported: true,
            },
            depth: DepthInfo {
                supported: self.depth_supported,
                enabled: state.depth_enabled,
            },
        }
    }

    fn zoom_factor(&self) -> f64 {
        self.state.lock().unwrap().zoom
    }

    fn set_zoom_factor(&self, factor: f64) -> Result<()> {
        let (min, max) = self.zoom_range;
        self.mutate(|state| {
            if !(min..=max).contains(&factor) {
                return Err(EngineError::UnsupportedCapability(format!(
                    "zoom factor {factor} outside {min}..{max}"
                )));
            }
            state.zoom = factor;
            Ok(())
        })
    }

    fn set_exposure_bias(&self, bias: f64) -> Result<()> {
        self.mutate(|state| {
            let (min, max) = EXPOSURE_BIAS_RANGE;
            if !(min..=max).contains(&bias) {
                return Err(EngineError::UnsupportedCapability(format!(
                    "exposure bias {bias} outside {min}..{max}"
                )));
            }
            state.exposure_bias = bias;
            Ok(())
        })
    }

    fn white_balance(&self) -> WhiteBalanceReading {
        self.state.lock().unwrap().white_balance
    }

    fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> Result<()> {
        self.mutate(|state| {
            state.white_balance.mode = mode;
            Ok(())
        })
    }

    fn set_white_balance_temp_tint(&self, temperature: f64, tint: f64) -> Result<()> {
        self.mutate(|state| {
            if state.white_balance.mode != WhiteBalanceMode::Locked {
                return Err(EngineError::UnsupportedCapability(
                    "white balance gains require locked mode".to_string(),
                ));
            }
            state.white_balance.temperature = temperature;
            state.white_balance.tint = tint;
            Ok(())
        })
    }

    fn lock_grey_white_balance(&self) -> Result<()> {
        self.mutate(|state| {
            state.white_balance = WhiteBalanceReading {
                mode: WhiteBalanceMode::Locked,
                temperature: 5600.0,
                tint: 0.0,
            };
            Ok(())
        })
    }

    fn set_focus_point(&self, x: f64, y: f64) -> Result<()> {
        self.mutate(|state| {
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                return Err(EngineError::UnsupportedCapability(format!(
                    "focus point ({x}, {y}) outside the unit square"
                )));
            }
            state.focus_point = (x, y);
            Ok(())
        })
    }

    fn set_frame_rate(&self, fps: f64) -> Result<()> {
        self.mutate(|state| {
            let (min, max) = FRAME_RATE_RANGE;
            if !(min..=max).contains(&fps) {
                return Err(EngineError::UnsupportedCapability(format!(
                    "frame rate {fps} outside {min}..{max}"
                )));
            }
            state.frame_rate = fps;
            Ok(())
        })
    }

    fn active_preset(&self) -> SessionPreset {
        self.state.lock().unwrap().preset
    }

    fn set_preset(&self, preset: SessionPreset) -> Result<()> {
        let supported = self.supported_presets.contains(&preset);
        let seed = self.descriptor.unique_id.len() as u8;
        self.mutate(|state| {
            if !supported {
                return Err(EngineError::UnsupportedCapability(format!(
                    "preset {} is not supported",
                    preset.label()
                )));
            }
            if state.preset != preset {
                let (width, height) = preset.dimensions();
                state.preset = preset;
                state.pattern = test_pattern(width, height, seed);
                if state.depth_enabled {
                    state.depth_pattern = Some(depth_pattern(width, height));
                }
            }
            Ok(())
        })
    }

    fn set_depth_delivery(&self, enabled: bool) -> Result<()> {
        let supported = self.depth_supported;
        self.mutate(|state| {
            if !supported {
                return Err(EngineError::UnsupportedCapability(
                    "depth delivery is not supported".to_string(),
                ));
            }
            state.depth_enabled = enabled;
            state.depth_due = false;
            state.depth_pattern = if enabled {
                let (width, height) = state.preset.dimensions();
                Some(depth_pattern(width, height))
            } else {
                None
            };
            Ok(())
        })
    }
}

/// Synthetic back and front cameras
pub struct SyntheticCameraSource {
    devices: Vec<Arc<SyntheticDevice>>,
}

impl SyntheticCameraSource {
    pub fn new() -> Self {
        let back = SyntheticDevice::new(
            DeviceDescriptor {
                unique_id: "synthetic-back-wide".to_string(),
                name: "Synthetic Back Camera".to_string(),
                position: DevicePosition::Back,
                device_type: "wide-angle".to_string(),
            },
            vec![
                SessionPreset::Hd720,
                SessionPreset::Hd1080,
                SessionPreset::Uhd4k,
            ],
            (1.0, 16.0),
            false,
            0x00,
        );
        let front = SyntheticDevice::new(
            DeviceDescriptor {
                unique_id: "synthetic-front-wide".to_string(),
                name: "Synthetic Front Camera".to_string(),
                position: DevicePosition::Front,
                device_type: "wide-angle".to_string(),
            },
            vec![SessionPreset::Hd720, SessionPreset::Hd1080],
            (1.0, 4.0),
            true,
            0x5a,
        );
        Self {
            devices: vec![back, front],
        }
    }

    fn find(&self, unique_id: &str) -> Result<&Arc<SyntheticDevice>> {
        self.devices
            .iter()
            .find(|d| d.descriptor.unique_id == unique_id)
            .ok_or_else(|| {
                EngineError::DeviceUnavailable(format!("no camera with id {unique_id}"))
            })
    }
}

impl Default for SyntheticCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for SyntheticCameraSource {
    fn discover(&self) -> Vec<DeviceDescriptor> {
        self.devices.iter().map(|d| d.descriptor.clone()).collect()
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Arc<dyn CaptureHandle>> {
        // Devices are long-lived; reopening returns the same state.
        let device = self.find(&descriptor.unique_id)?;
        Ok(Arc::clone(device) as Arc<dyn CaptureHandle>)
    }

    fn profile(&self, descriptor: &DeviceDescriptor) -> Result<DeviceProfile> {
        Ok(self.find(&descriptor.unique_id)?.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_back(source: &SyntheticCameraSource) -> Arc<dyn CaptureHandle> {
        let descriptor = source
            .discover()
            .into_iter()
            .find(|d| d.position == DevicePosition::Back)
            .unwrap();
        source.open(&descriptor).unwrap()
    }

    #[test]
    fn test_discovery_and_capabilities() {
        let source = SyntheticCameraSource::new();
        let devices = source.discover();
        assert_eq!(devices.len(), 2);

        let back = source.profile(&devices[0]).unwrap();
        assert!(back
            .properties
            .supported_presets
            .contains(&"4K".to_string()));
        assert!(!back.depth.supported);

        let front = source.profile(&devices[1]).unwrap();
        assert!(!front
            .properties
            .supported_presets
            .contains(&"4K".to_string()));
        assert!(front.depth.supported);
    }

    #[test]
    fn test_open_unknown_device_fails() {
        let source = SyntheticCameraSource::new();
        let descriptor = DeviceDescriptor {
            unique_id: "ghost".to_string(),
            name: "Ghost".to_string(),
            position: DevicePosition::External,
            device_type: "wide-angle".to_string(),
        };
        assert!(matches!(
            source.open(&descriptor),
            Err(EngineError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_mutation_requires_configuration_lock() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        let err = device.set_zoom_factor(2.0).unwrap_err();
        assert!(matches!(err, EngineError::ConfigurationLockFailed(_)));

        device.lock_for_configuration().unwrap();
        device.set_zoom_factor(2.0).unwrap();
        device.unlock_for_configuration();
        assert_eq!(device.zoom_factor(), 2.0);
    }

    #[test]
    fn test_out_of_range_zoom_is_rejected_without_side_effects() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        device.lock_for_configuration().unwrap();
        let err = device.set_zoom_factor(999.0).unwrap_err();
        device.unlock_for_configuration();

        assert!(matches!(err, EngineError::UnsupportedCapability(_)));
        assert_eq!(device.zoom_factor(), 1.0);
    }

    #[test]
    fn test_double_lock_is_rejected() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        device.lock_for_configuration().unwrap();
        assert!(device.lock_for_configuration().is_err());
        device.unlock_for_configuration();
        device.lock_for_configuration().unwrap();
    }

    #[test]
    fn test_preset_changes_frame_dimensions() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        device.lock_for_configuration().unwrap();
        device.set_preset(SessionPreset::Hd720).unwrap();
        device.unlock_for_configuration();

        let frame = device.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        let meta = frame.video_meta().unwrap();
        assert_eq!((meta.width, meta.height), (1280, 720));
        assert_eq!(
            frame.data.len(),
            PixelFormat::Bgra32.frame_size(1280, 720)
        );
    }

    #[test]
    fn test_unsupported_preset_rejected() {
        let source = SyntheticCameraSource::new();
        let descriptor = source
            .discover()
            .into_iter()
            .find(|d| d.position == DevicePosition::Front)
            .unwrap();
        let device = source.open(&descriptor).unwrap();

        device.lock_for_configuration().unwrap();
        let err = device.set_preset(SessionPreset::Uhd4k).unwrap_err();
        device.unlock_for_configuration();

        assert!(matches!(err, EngineError::UnsupportedCapability(_)));
        assert_eq!(device.active_preset(), SessionPreset::Hd1080);
    }

    #[test]
    fn test_white_balance_gains_require_locked_mode() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        device.lock_for_configuration().unwrap();
        let err = device.set_white_balance_temp_tint(4500.0, 5.0).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedCapability(_)));

        device
            .set_white_balance_mode(WhiteBalanceMode::Locked)
            .unwrap();
        device.set_white_balance_temp_tint(4500.0, 5.0).unwrap();
        device.unlock_for_configuration();

        let reading = device.white_balance();
        assert_eq!(reading.mode, WhiteBalanceMode::Locked);
        assert_eq!(reading.temperature, 4500.0);
        assert_eq!(reading.tint, 5.0);
    }

    #[test]
    fn test_grey_lock_switches_mode() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        device.lock_for_configuration().unwrap();
        device.lock_grey_white_balance().unwrap();
        device.unlock_for_configuration();

        assert_eq!(device.white_balance().mode, WhiteBalanceMode::Locked);
    }

    #[test]
    fn test_depth_delivery_only_where_supported() {
        let source = SyntheticCameraSource::new();
        let devices = source.discover();

        let back = source.open(&devices[0]).unwrap();
        back.lock_for_configuration().unwrap();
        assert!(back.set_depth_delivery(true).is_err());
        back.unlock_for_configuration();

        let front = source.open(&devices[1]).unwrap();
        front.lock_for_configuration().unwrap();
        front.set_depth_delivery(true).unwrap();
        front.unlock_for_configuration();
        assert!(front.profile().depth.enabled);
    }

    #[test]
    fn test_depth_frames_ride_behind_video() {
        let source = SyntheticCameraSource::new();
        let descriptor = source
            .discover()
            .into_iter()
            .find(|d| d.position == DevicePosition::Front)
            .unwrap();
        let device = source.open(&descriptor).unwrap();

        device.lock_for_configuration().unwrap();
        device.set_depth_delivery(true).unwrap();
        device.unlock_for_configuration();

        let first = device.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(first.video_meta().unwrap().format, PixelFormat::Bgra32);

        let second = device.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        let meta = second.video_meta().unwrap();
        assert_eq!(meta.format, PixelFormat::Depth32);
        assert_eq!(
            second.data.len(),
            PixelFormat::Depth32.frame_size(meta.width, meta.height)
        );

        let third = device.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(third.video_meta().unwrap().format, PixelFormat::Bgra32);
    }

    #[test]
    fn test_first_frame_arrives_immediately() {
        let source = SyntheticCameraSource::new();
        let device = open_back(&source);

        let frame = device.next_frame(Duration::from_secs(1)).unwrap();
        assert!(frame.is_some());
    }

    #[test]
    fn test_settings_survive_reopen() {
        let source = SyntheticCameraSource::new();
        let descriptor = source.discover()[0].clone();

        let device = source.open(&descriptor).unwrap();
        device.lock_for_configuration().unwrap();
        device.set_zoom_factor(3.0).unwrap();
        device.unlock_for_configuration();

        let reopened = source.open(&descriptor).unwrap();
        assert_eq!(reopened.zoom_factor(), 3.0);
    }
}
