//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeepqError {
    /// The experience buffer holds fewer transitions than requested.
    ///
    /// Callers skip the optimization step on this error, training continues.
    #[error("Insufficient data: requested {requested} transitions, buffer holds {available}")]
    InsufficientData {
        /// Requested batch size.
        requested: usize,
        /// Number of transitions in the buffer.
        available: usize,
    },

    /// An error surfaced by the environment.
    #[error("Environment error: {0}")]
    Environment(String),

    /// Invalid configuration detected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A frame does not have the shape of the stacked-frame window.
    #[error("Frame shape mismatch: expected {expected:?}, got {actual:?}")]
    FrameShape {
        /// Shape of frames in the window.
        expected: [usize; 2],
        /// Shape of the given frame.
        actual: [usize; 2],
    },

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKey(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueType(String),
}

impl DeepqError {
    /// Returns `true` if `err` is [`DeepqError::InsufficientData`].
    pub fn is_insufficient_data(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<DeepqError>(),
            Some(DeepqError::InsufficientData { .. })
        )
    }

    /// Creates [`DeepqError::InvalidConfiguration`].
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
