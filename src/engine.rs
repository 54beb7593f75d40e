//! Engine assembly
//!
//! Wires capture, rendering, distribution, recording and readiness into one
//! object and implements the control capability surface on top of it. Device
//! and I/O backends are injected through [`EngineInterfaces`], so the same
//! engine runs against real hardware or the synthetic implementations in
//! [`crate::source`].

use std::sync::Arc;

use crate::audio::{AudioDeviceInfo, AudioSource};
use crate::capture::{
    CaptureSource, DeviceQuery, SessionPreset, WhiteBalanceMode, WhiteBalanceReading,
};
use crate::config::EngineConfig;
use crate::control::capability::ControlCapabilities;
use crate::error::{EngineError, Result};
use crate::frame::PixelFormat;
use crate::orchestrator::{CaptureOrchestrator, FrameSink};
use crate::pipeline::FramePipeline;
use crate::pool::SharedBufferPool;
use crate::profile::DeviceProfile;
use crate::readiness::{ReadinessCoordinator, ReadinessFlag};
use crate::recorder::{Recorder, WriterFactory};
use crate::render::{BokehParams, BoundedRenderer, ImageCompositor};
use crate::sender::{DistributionSender, TransportSender};

/// Device and I/O backends injected into the engine
pub struct EngineInterfaces {
    pub capture: Arc<dyn CaptureSource>,
    pub audio: Option<Arc<dyn AudioSource>>,
    pub compositor: Arc<dyn ImageCompositor>,
    pub transport: Arc<dyn TransportSender>,
    pub writers: Arc<dyn WriterFactory>,
}

/// The capture-to-distribution engine
pub struct Engine {
    orchestrator: Arc<CaptureOrchestrator>,
    pipeline: Arc<FramePipeline>,
    sender: Arc<DistributionSender>,
    recorder: Arc<Recorder>,
    readiness: Arc<ReadinessCoordinator>,
    pools: Arc<SharedBufferPool>,
    audio: Option<Arc<dyn AudioSource>>,
}

impl Engine {
    /// Assemble an engine
    ///
    /// Fails when no capture device is available; a control server can still
    /// run unattached in that case.
    pub fn new(config: EngineConfig, interfaces: EngineInterfaces) -> Result<Self> {
        let pools = Arc::new(SharedBufferPool::new(
            PixelFormat::Bgra32,
            config.pool_capacity,
        ));
        let (width, height) = config.default_preset.dimensions();
        pools.rebuild(width, height);

        let sender = Arc::new(DistributionSender::new(
            Arc::clone(&interfaces.transport),
            Arc::clone(&pools),
        ));
        let recorder = Arc::new(Recorder::new(
            Arc::clone(&interfaces.writers),
            config.recordings_dir.clone(),
            interfaces.audio.is_some(),
        ));
        let renderer = Arc::new(BoundedRenderer::new(
            Arc::clone(&interfaces.compositor),
            Arc::clone(&pools),
            config.render_slots,
        ));
        let pipeline = Arc::new(FramePipeline::new(
            renderer,
            Arc::clone(&sender),
            Arc::clone(&recorder),
        ));

        let orchestrator = Arc::new(CaptureOrchestrator::new(
            Arc::clone(&interfaces.capture),
            interfaces.audio.clone(),
            Arc::clone(&pipeline) as Arc<dyn FrameSink>,
            config.frame_wait,
        )?);

        let readiness = Arc::new(ReadinessCoordinator::new(
            Arc::clone(&sender),
            config.stream_name.clone(),
        ));

        let observer = Arc::clone(&readiness);
        orchestrator.set_preset_observer(Box::new(move |width, height| {
            observer.did_preset_change(width, height);
        }));

        // Bring the device to the configured preset; a rejection leaves the
        // device at its own default, which the profile reports truthfully.
        if let Err(e) = orchestrator.set_preset(config.default_preset) {
            tracing::warn!(error = %e, "could not apply start-up preset");
        }

        Ok(Self {
            orchestrator,
            pipeline,
            sender,
            recorder,
            readiness,
            pools,
            audio: interfaces.audio,
        })
    }

    /// Start the capture workers and mark the camera ready
    pub fn start(&self) {
        self.orchestrator.start();
        self.readiness.set_flag(ReadinessFlag::CameraReady, true);
    }

    /// Stop capture, distribution and any active recording
    pub fn stop(&self) {
        self.orchestrator.stop();
        self.sender.stop();

        if self.recorder.is_recording() {
            match self.recorder.stop_recording_blocking() {
                Ok(path) => tracing::info!(path = %path.display(), "recording closed at shutdown"),
                Err(e) => tracing::warn!(error = %e, "failed to close recording at shutdown"),
            }
        }
    }

    /// Mark the control server ready
    ///
    /// Together with camera readiness this arms the distribution auto-start.
    pub fn notify_control_listening(&self) {
        self.readiness.set_flag(ReadinessFlag::WebServerReady, true);
    }

    /// Outbound distribution path
    pub fn sender(&self) -> &Arc<DistributionSender> {
        &self.sender
    }

    /// Frame fan-out and filter state
    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    fn audio_source(&self) -> Result<&Arc<dyn AudioSource>> {
        self.audio
            .as_ref()
            .ok_or_else(|| EngineError::UnsupportedCapability("no audio source".to_string()))
    }
}

impl ControlCapabilities for Engine {
    fn camera_profiles(&self) -> Vec<DeviceProfile> {
        self.orchestrator.device_profiles()
    }

    fn active_camera(&self) -> DeviceProfile {
        self.orchestrator.active_profile()
    }

    fn select_camera(&self, unique_id: &str) -> Result<()> {
        self.orchestrator
            .switch_device(&DeviceQuery::UniqueId(unique_id.to_string()))
    }

    fn set_zoom(&self, factor: f64) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_zoom_factor(factor))
    }

    fn set_exposure_bias(&self, bias: f64) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_exposure_bias(bias))
    }

    fn white_balance(&self) -> WhiteBalanceReading {
        self.orchestrator.active_handle().white_balance()
    }

    fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_white_balance_mode(mode))
    }

    fn set_white_balance_temp_tint(&self, temperature: f64, tint: f64) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_white_balance_temp_tint(temperature, tint))
    }

    fn lock_grey_white_balance(&self) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.lock_grey_white_balance())
    }

    fn set_focus_point(&self, x: f64, y: f64) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_focus_point(x, y))
    }

    fn set_frame_rate(&self, fps: f64) -> Result<()> {
        self.orchestrator
            .apply_device_mutation(|device| device.set_frame_rate(fps))
    }

    fn set_preset(&self, preset: SessionPreset) -> Result<()> {
        self.orchestrator.set_preset(preset)
    }

    fn streaming_started(&self) -> bool {
        self.readiness.streaming_started()
    }

    fn user_start_streaming(&self) {
        self.readiness.user_start_streaming();
    }

    fn user_stop_streaming(&self) {
        self.readiness.user_stop_streaming();
    }

    fn start_recording(&self) -> Result<()> {
        self.recorder.start_recording()
    }

    fn stop_recording(&self) -> Result<std::path::PathBuf> {
        self.recorder.stop_recording_blocking()
    }

    fn audio_inputs(&self) -> Result<Vec<AudioDeviceInfo>> {
        Ok(self.audio_source()?.inputs())
    }

    fn current_audio_input(&self) -> Result<Option<AudioDeviceInfo>> {
        Ok(self.audio_source()?.current_input())
    }

    fn select_audio_input(&self, uid: &str) -> Result<()> {
        self.audio_source()?.select_input(uid)
    }

    fn audio_outputs(&self) -> Result<Vec<AudioDeviceInfo>> {
        Ok(self.audio_source()?.outputs())
    }

    fn current_audio_output(&self) -> Result<Option<AudioDeviceInfo>> {
        Ok(self.audio_source()?.current_output())
    }

    fn set_bokeh(&self, params: Option<BokehParams>) -> Result<()> {
        self.pipeline.set_bokeh(params);
        Ok(())
    }
}
