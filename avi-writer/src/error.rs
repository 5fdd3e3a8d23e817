//! Writer error types.

use thiserror::Error;

/// Errors raised anywhere along a stream chain or by the container sink.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied value failed validation. Raised before any encode or I/O.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The encoder rejected its input or failed internally.
    #[error("encoder error: {0:#}")]
    Encoder(anyhow::Error),

    /// A queued callback panicked, or its worker is gone.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// The operation is not allowed in the current writer or stream state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A container format limit was exceeded.
    #[error("container error: {0}")]
    Container(String),

    /// I/O error while writing the container.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration document.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, Error::Argument(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Validates one `(buffer, start, length)` unit and returns the addressed range.
pub(crate) fn unit_range(data: &[u8], start: usize, length: usize) -> Result<&[u8]> {
    if length == 0 {
        return Err(Error::argument("cannot write an empty unit"));
    }
    let end = start
        .checked_add(length)
        .ok_or_else(|| Error::argument("end offset overflows"))?;
    if end > data.len() {
        return Err(Error::argument(format!(
            "end offset {} exceeds the length of data ({})",
            end,
            data.len()
        )));
    }
    Ok(&data[start..end])
}
