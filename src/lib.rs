//! Live capture pipeline with network distribution and an HTTP control plane
//!
//! camcast pulls frames from a capture device, corrects and filters them on a
//! bounded render stage, and fans the results out to a network transport and
//! an on-disk recorder. An HTTP control plane drives the running pipeline:
//! camera selection, zoom, exposure, white balance, presets, streaming,
//! recording and filters.
//!
//! # Architecture
//!
//! ```text
//!  CaptureSource ──> CaptureOrchestrator ──> FramePipeline
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                     Recorder            BoundedRenderer
//!                        │                      │
//!                        ▼                      ▼
//!                  segment file       DistributionSender ──> TransportSender
//! ```
//!
//! Device and I/O backends are injected through [`EngineInterfaces`]; the
//! [`source`] module provides synthetic implementations that run anywhere.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camcast::source::{
//!     LoggingTransport, SegmentWriterFactory, SoftwareCompositor, SyntheticAudioSource,
//!     SyntheticCameraSource,
//! };
//! use camcast::{ControlConfig, ControlServer, Engine, EngineConfig, EngineInterfaces};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(Engine::new(
//!         EngineConfig::default(),
//!         EngineInterfaces {
//!             capture: Arc::new(SyntheticCameraSource::new()),
//!             audio: Some(Arc::new(SyntheticAudioSource::new())),
//!             compositor: Arc::new(SoftwareCompositor::new()),
//!             transport: Arc::new(LoggingTransport::new()),
//!             writers: Arc::new(SegmentWriterFactory::new()),
//!         },
//!     )?);
//!     engine.start();
//!
//!     let server = ControlServer::new(ControlConfig::default());
//!     server.attach(engine.clone());
//!     engine.notify_control_listening();
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod frame;
pub mod gate;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod profile;
pub mod readiness;
pub mod recorder;
pub mod render;
pub mod sender;
pub mod source;

pub use config::{ControlConfig, EngineConfig};
pub use control::ControlServer;
pub use engine::{Engine, EngineInterfaces};
pub use error::{EngineError, Result};
