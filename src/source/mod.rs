//! Synthetic device backends
//!
//! Software implementations of every engine interface: a pattern-generating
//! camera, a tone-generating microphone, a CPU compositor, a logging
//! transport and a simple segment container. They drive the full pipeline in
//! the demo binary and in tests without touching hardware.

pub mod audio;
pub mod camera;
pub mod compositor;
pub mod transport;
pub mod writer;

pub use audio::SyntheticAudioSource;
pub use camera::SyntheticCameraSource;
pub use compositor::SoftwareCompositor;
pub use transport::LoggingTransport;
pub use writer::{SegmentWriter, SegmentWriterFactory};
