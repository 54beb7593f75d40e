//! Local recording
//!
//! A two-state machine (idle and recording) in front of a container writer.
//! All file I/O happens on a dedicated worker thread fed by a job channel, so
//! the capture thread's per-frame `record` call never waits on disk. State
//! transitions and the per-frame recording check share one lock; the capture
//! thread and the control plane cannot race a start or stop.
//!
//! A failed append drops that frame and nothing else; recording continues
//! until an explicit stop. Stop finishes the file on the worker thread and
//! reports the final path through a completion callback.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{SecondsFormat, Utc};

use crate::error::{EngineError, Result};
use crate::frame::Frame;

/// Sink that serializes frames into a playable file
pub trait ContainerWriter: Send {
    /// Append one frame
    fn append(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the file
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Creates container writers for new recordings
pub trait WriterFactory: Send + Sync {
    /// Create a writer targeting `path`
    fn create(&self, path: &Path, has_audio: bool) -> Result<Box<dyn ContainerWriter>>;

    /// File extension for the container format, without the dot
    fn file_extension(&self) -> &'static str;
}

/// Callback invoked with the finished file path once a stop completes
pub type StopCompletion = Box<dyn FnOnce(Result<PathBuf>) + Send>;

enum WriterJob {
    Begin {
        writer: Box<dyn ContainerWriter>,
        path: PathBuf,
    },
    Append(Frame),
    Finish {
        completion: StopCompletion,
    },
}

/// Idle/recording state machine over a serial writer queue
pub struct Recorder {
    factory: Arc<dyn WriterFactory>,
    directory: PathBuf,
    has_audio: bool,
    jobs: flume::Sender<WriterJob>,
    recording: Mutex<bool>,
}

impl Recorder {
    /// Create a recorder writing into `directory`
    pub fn new(factory: Arc<dyn WriterFactory>, directory: PathBuf, has_audio: bool) -> Self {
        let (jobs, queue) = flume::unbounded();

        // The worker owns the writer for the lifetime of the recorder and
        // drains outstanding jobs when the channel closes.
        thread::spawn(move || run_writer_queue(queue));

        Self {
            factory,
            directory,
            has_audio,
            jobs,
            recording: Mutex::new(false),
        }
    }

    /// True while a recording is active
    pub fn is_recording(&self) -> bool {
        *self.recording.lock().unwrap()
    }

    /// Begin a new recording
    ///
    /// Creates a fresh time-stamped file. Calling while already recording is
    /// a no-op; the active recording keeps its writer.
    pub fn start_recording(&self) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        if *recording {
            tracing::debug!("already recording");
            return Ok(());
        }

        let path = self.timestamped_path();
        let writer = self.factory.create(&path, self.has_audio)?;
        if self.jobs.send(WriterJob::Begin { writer, path: path.clone() }).is_err() {
            return Err(EngineError::WriterFailed(
                "recorder worker is gone".to_string(),
            ));
        }

        *recording = true;
        tracing::info!(path = %path.display(), "recording started");
        Ok(())
    }

    /// Append one frame to the active recording
    ///
    /// A no-op while idle. Append errors are handled on the worker thread and
    /// never stop the recording.
    pub fn record(&self, frame: Frame) {
        let recording = self.recording.lock().unwrap();
        if !*recording {
            return;
        }
        let _ = self.jobs.send(WriterJob::Append(frame));
    }

    /// Stop the active recording
    ///
    /// The writer is flushed and closed asynchronously on the worker thread;
    /// `completion` receives the finished file path or the close error. When
    /// no recording is active, `completion` is invoked immediately with an
    /// error.
    pub fn stop_recording(&self, completion: StopCompletion) {
        let mut recording = self.recording.lock().unwrap();
        if !*recording {
            drop(recording);
            completion(Err(EngineError::WriterFailed(
                "no active recording".to_string(),
            )));
            return;
        }

        *recording = false;
        if let Err(flume::SendError(job)) = self.jobs.send(WriterJob::Finish { completion }) {
            if let WriterJob::Finish { completion } = job {
                completion(Err(EngineError::WriterFailed(
                    "recorder worker is gone".to_string(),
                )));
            }
        }
    }

    /// Stop the active recording and wait for the finished file path
    pub fn stop_recording_blocking(&self) -> Result<PathBuf> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.stop_recording(Box::new(move |result| {
            let _ = tx.send(result);
        }));

        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(EngineError::WriterFailed(
                "recorder worker dropped the completion".to_string(),
            )),
        }
    }

    fn timestamped_path(&self) -> PathBuf {
        // Wall-clock ISO-8601 with ':' swapped out for filesystem safety.
        let stamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "_");
        self.directory
            .join(format!("{stamp}.{}", self.factory.file_extension()))
    }
}

fn run_writer_queue(queue: flume::Receiver<WriterJob>) {
    let mut active: Option<(Box<dyn ContainerWriter>, PathBuf)> = None;

    while let Ok(job) = queue.recv() {
        match job {
            WriterJob::Begin { writer, path } => {
                if active.is_some() {
                    tracing::warn!("writer replaced while one was active");
                }
                active = Some((writer, path));
            }
            WriterJob::Append(frame) => match active.as_mut() {
                Some((writer, path)) => {
                    if let Err(e) = writer.append(&frame) {
                        tracing::warn!(
                            error = %e,
                            path = %path.display(),
                            "append failed; frame dropped"
                        );
                    }
                }
                None => {
                    tracing::trace!("append after finish; frame dropped");
                }
            },
            WriterJob::Finish { completion } => match active.take() {
                Some((writer, path)) => {
                    let result = match writer.finish() {
                        Ok(()) => {
                            tracing::info!(path = %path.display(), "recording finished");
                            Ok(path)
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to finish recording");
                            Err(e)
                        }
                    };
                    completion(result);
                }
                None => {
                    completion(Err(EngineError::WriterFailed(
                        "no active writer".to_string(),
                    )));
                }
            },
        }
    }

    // Recorder dropped mid-recording: close the file rather than leak it.
    if let Some((writer, path)) = active.take() {
        if let Err(e) = writer.finish() {
            tracing::error!(error = %e, path = %path.display(), "failed to finish recording at shutdown");
        }
    }
}
