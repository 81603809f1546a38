//! Error types for kf8 operations.

use thiserror::Error;

/// Errors that can occur while building, writing or reading a container.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller or programmer contract was broken (oversized text record,
    /// unknown tag mask, a value too wide for its fixed field).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The head-markup renderer failed. Never replaced by a fallback.
    #[error("template error: {0}")]
    Template(String),

    #[error("record index {index} out of range (container has {len} records)")]
    RecordOutOfRange { index: usize, len: usize },

    #[error("invalid container: {0}")]
    InvalidContainer(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }
}
