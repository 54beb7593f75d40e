//! Synthetic audio
//!
//! A software microphone pair and a sine-tone stream. Blocks are mono 16-bit
//! PCM at 48 kHz, paced at 20 ms of real time each.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::audio::{AudioDeviceInfo, AudioSource, AudioStream};
use crate::error::{EngineError, Result};
use crate::frame::{AudioMeta, Frame};

const SAMPLE_RATE: u32 = 48_000;
const BLOCK: Duration = Duration::from_millis(20);
const SAMPLES_PER_BLOCK: u32 = SAMPLE_RATE / 50;

/// Synthetic microphones and speaker
pub struct SyntheticAudioSource {
    inputs: Vec<AudioDeviceInfo>,
    outputs: Vec<AudioDeviceInfo>,
    current_input: Mutex<String>,
}

impl SyntheticAudioSource {
    pub fn new() -> Self {
        let inputs = vec![
            AudioDeviceInfo {
                uid: "synthetic-mic-builtin".to_string(),
                name: "Synthetic Built-in Mic".to_string(),
                port_type: "builtin".to_string(),
            },
            AudioDeviceInfo {
                uid: "synthetic-mic-headset".to_string(),
                name: "Synthetic Headset Mic".to_string(),
                port_type: "headset".to_string(),
            },
        ];
        let outputs = vec![AudioDeviceInfo {
            uid: "synthetic-speaker".to_string(),
            name: "Synthetic Speaker".to_string(),
            port_type: "builtin".to_string(),
        }];
        let current_input = Mutex::new(inputs[0].uid.clone());
        Self {
            inputs,
            outputs,
            current_input,
        }
    }
}

impl Default for SyntheticAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for SyntheticAudioSource {
    fn inputs(&self) -> Vec<AudioDeviceInfo> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<AudioDeviceInfo> {
        self.outputs.clone()
    }

    fn current_input(&self) -> Option<AudioDeviceInfo> {
        let uid = self.current_input.lock().unwrap().clone();
        self.inputs.iter().find(|i| i.uid == uid).cloned()
    }

    fn current_output(&self) -> Option<AudioDeviceInfo> {
        self.outputs.first().cloned()
    }

    fn select_input(&self, uid: &str) -> Result<()> {
        if !self.inputs.iter().any(|i| i.uid == uid) {
            return Err(EngineError::DeviceUnavailable(format!(
                "no audio input with uid {uid}"
            )));
        }
        *self.current_input.lock().unwrap() = uid.to_string();
        tracing::info!(uid = %uid, "audio input selected");
        Ok(())
    }

    fn open_stream(&self) -> Result<Box<dyn AudioStream>> {
        Ok(Box::new(ToneStream::new(440.0)))
    }
}

/// Sine tone generator
pub struct ToneStream {
    frequency: f64,
    phase: f64,
    epoch: Instant,
    last_block: Option<Instant>,
}

impl ToneStream {
    fn new(frequency: f64) -> Self {
        Self {
            frequency,
            phase: 0.0,
            epoch: Instant::now(),
            last_block: None,
        }
    }
}

impl AudioStream for ToneStream {
    fn next_block(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if let Some(last) = self.last_block {
            let due = last + BLOCK;
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
        self.last_block = Some(Instant::now());

        let step = std::f64::consts::TAU * self.frequency / SAMPLE_RATE as f64;
        let mut data = Vec::with_capacity(SAMPLES_PER_BLOCK as usize * 2);
        for _ in 0..SAMPLES_PER_BLOCK {
            let sample = (self.phase.sin() * i16::MAX as f64 * 0.2) as i16;
            data.extend_from_slice(&sample.to_le_bytes());
            self.phase = (self.phase + step) % std::f64::consts::TAU;
        }

        Ok(Some(Frame::audio(
            self.epoch.elapsed(),
            Bytes::from(data),
            AudioMeta {
                sample_rate: SAMPLE_RATE,
                channels: 1,
                samples: SAMPLES_PER_BLOCK,
            },
        )))
    }
}
