//! Engine error types

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the capture engine and its control plane
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No capture device matched the requested criteria
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device configuration lock could not be acquired
    #[error("configuration lock failed: {0}")]
    ConfigurationLockFailed(String),

    /// Requested setting is outside the device's supported range or mode
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// The image compositor rejected or failed a render
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// The pixel buffer pool is exhausted or misconfigured
    #[error("pool allocation failed: {0}")]
    PoolAllocationFailed(String),

    /// The container writer could not be created or failed during I/O
    #[error("writer failed: {0}")]
    WriterFailed(String),

    /// Control-plane input failed validation
    #[error("malformed request: {0}")]
    RequestMalformed(String),
}

impl EngineError {
    /// True for errors caused by invalid caller input rather than a failed operation
    pub fn is_malformed(&self) -> bool {
        matches!(self, EngineError::RequestMalformed(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::WriterFailed(e.to_string())
    }
}
