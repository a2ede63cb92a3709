//! Block error taxonomy.
//!
//! Every fallible operation in the crate returns [`Result`]. Configuration
//! problems (bad device names, unsupported element types, empty tap lists)
//! surface at construction or property-set time as
//! [`BlockError::InvalidArgument`]; contract breaches between a block and its
//! host surface as [`BlockError::AssertionViolation`] and abort only the
//! current `work()` step; missing devices surface as
//! [`BlockError::Environment`].

/// Errors raised by blocks, kernels and the buffer adapter.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// A parameter or input value is not acceptable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A named property, key or registry path does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An internal size or state contract was broken.
    #[error("assertion violation: {0}")]
    AssertionViolation(String),
    /// The runtime environment cannot satisfy the request (no devices, etc).
    #[error("environment error: {0}")]
    Environment(String),
    /// Operands live on different devices.
    #[error("device mismatch: {0}")]
    DeviceMismatch(String),
    /// A required file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// A file exists but cannot be used as requested.
    #[error("file access error: {0}")]
    FileAccess(String),
    /// A file or byte stream does not decode to a valid array.
    #[error("data format error: {0}")]
    DataFormat(String),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlockError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn assertion(msg: impl Into<String>) -> Self {
        Self::AssertionViolation(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BlockError>;
