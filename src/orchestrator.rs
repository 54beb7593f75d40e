//! Capture orchestration
//!
//! Owns the active capture device and the worker threads that pull frames
//! from it. Video and audio each run on their own thread, pulling with a
//! bounded wait and handing every frame to a [`FrameSink`]; the sink is the
//! seam between capture and the processing pipeline, which is why switching
//! the active device never touches the pipeline.
//!
//! All device mutations go through [`CaptureOrchestrator::apply_device_mutation`],
//! which serializes the hardware's lock/mutate/unlock bracket under one
//! mutex. Two control-plane requests can never interleave inside a bracket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::AudioSource;
use crate::capture::{CaptureHandle, CaptureSource, DeviceDescriptor, DevicePosition, DeviceQuery, SessionPreset};
use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::profile::DeviceProfile;

/// Receives every captured frame
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: Frame);
}

/// Called with the new output dimensions after a preset change
pub type PresetObserver = Box<dyn Fn(u32, u32) + Send + Sync>;

/// Runs capture workers and serializes device configuration
pub struct CaptureOrchestrator {
    source: Arc<dyn CaptureSource>,
    audio: Option<Arc<dyn AudioSource>>,
    sink: Arc<dyn FrameSink>,
    active: RwLock<Arc<dyn CaptureHandle>>,
    config_lock: Mutex<()>,
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    frame_timeout: Duration,
    preset_observer: Mutex<Option<PresetObserver>>,
}

impl CaptureOrchestrator {
    /// Open the default device and prepare the workers
    ///
    /// Prefers a back-facing device, falling back to the first one found.
    /// Fails when no capture device exists.
    pub fn new(
        source: Arc<dyn CaptureSource>,
        audio: Option<Arc<dyn AudioSource>>,
        sink: Arc<dyn FrameSink>,
        frame_timeout: Duration,
    ) -> Result<Self> {
        let devices = source.discover();
        let descriptor = devices
            .iter()
            .find(|d| d.position == DevicePosition::Back)
            .or_else(|| devices.first())
            .cloned()
            .ok_or_else(|| {
                EngineError::DeviceUnavailable("no capture devices found".to_string())
            })?;

        let handle = source.open(&descriptor)?;
        tracing::info!(device = %descriptor.name, "opened capture device");

        Ok(Self {
            source,
            audio,
            sink,
            active: RwLock::new(handle),
            config_lock: Mutex::new(()),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            frame_timeout,
            preset_observer: Mutex::new(None),
        })
    }

    /// Register the callback notified after each preset change
    pub fn set_preset_observer(&self, observer: PresetObserver) {
        *self.preset_observer.lock().unwrap() = Some(observer);
    }

    /// True while the capture workers are running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the capture workers
    ///
    /// A no-op when already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut workers = self.workers.lock().unwrap();

        let video = Arc::clone(self);
        workers.push(thread::spawn(move || video.video_loop()));

        if self.audio.is_some() {
            let audio = Arc::clone(self);
            workers.push(thread::spawn(move || audio.audio_loop()));
        }

        tracing::info!("capture started");
    }

    /// Stop the workers and wait for them to exit
    ///
    /// Must not be called from a capture thread.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            let _ = worker.join();
        }

        tracing::info!("capture stopped");
    }

    /// Identity of the active device
    pub fn active_descriptor(&self) -> DeviceDescriptor {
        self.active.read().unwrap().descriptor()
    }

    /// Capability snapshot of the active device
    pub fn active_profile(&self) -> DeviceProfile {
        self.active.read().unwrap().profile()
    }

    /// The active device handle, for read-only queries
    pub fn active_handle(&self) -> Arc<dyn CaptureHandle> {
        self.active.read().unwrap().clone()
    }

    /// Capability snapshots for every attached device
    pub fn device_profiles(&self) -> Vec<DeviceProfile> {
        self.source
            .discover()
            .iter()
            .filter_map(|descriptor| match self.source.profile(descriptor) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(device = %descriptor.name, error = %e, "failed to read device profile");
                    None
                }
            })
            .collect()
    }

    /// Replace the active device with the first one matching `query`
    ///
    /// The running workers pick up the new handle on their next frame pull;
    /// the sink and everything downstream are untouched.
    pub fn switch_device(&self, query: &DeviceQuery) -> Result<()> {
        let _config = self.config_lock.lock().unwrap();

        let descriptor = self
            .source
            .discover()
            .into_iter()
            .find(|d| query.matches(d))
            .ok_or_else(|| EngineError::DeviceUnavailable(format!("no device for {query}")))?;

        let handle = self.source.open(&descriptor)?;
        *self.active.write().unwrap() = handle;
        tracing::info!(device = %descriptor.name, "switched capture device");
        Ok(())
    }

    /// Run one mutation inside the device's configuration bracket
    ///
    /// The handle stays locked for exactly the duration of `mutate`; the
    /// unlock happens whether or not the mutation succeeds.
    pub fn apply_device_mutation<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&dyn CaptureHandle) -> Result<()>,
    {
        let _config = self.config_lock.lock().unwrap();
        let handle = self.active.read().unwrap().clone();

        handle.lock_for_configuration()?;
        let result = mutate(handle.as_ref());
        handle.unlock_for_configuration();

        if let Err(e) = &result {
            tracing::warn!(error = %e, "device mutation rejected");
        }
        result
    }

    /// Switch the capture resolution and notify the preset observer
    pub fn set_preset(&self, preset: SessionPreset) -> Result<()> {
        self.apply_device_mutation(|device| device.set_preset(preset))?;

        let (width, height) = preset.dimensions();
        if let Some(observer) = self.preset_observer.lock().unwrap().as_ref() {
            observer(width, height);
        }

        tracing::info!(preset = preset.label(), "capture preset changed");
        Ok(())
    }

    fn video_loop(self: Arc<Self>) {
        tracing::debug!("video capture loop running");
        while self.running.load(Ordering::SeqCst) {
            let handle = self.active.read().unwrap().clone();
            match handle.next_frame(self.frame_timeout) {
                Ok(Some(frame)) => self.sink.deliver(frame),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "video capture error");
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        tracing::debug!("video capture loop exited");
    }

    fn audio_loop(self: Arc<Self>) {
        let Some(audio) = self.audio.as_ref() else {
            return;
        };

        let mut stream = match audio.open_stream() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "audio unavailable");
                return;
            }
        };

        tracing::debug!("audio capture loop running");
        while self.running.load(Ordering::SeqCst) {
            match stream.next_block(self.frame_timeout) {
                Ok(Some(frame)) => self.sink.deliver(frame),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "audio capture error");
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        tracing::debug!("audio capture loop exited");
    }
}
