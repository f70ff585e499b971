//! Error kinds raised while unpacking, scanning and extracting a document.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable input or unwritable output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OOXML archive could not be unpacked.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Structural violation inside a Compound File Binary container.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// An embedded base64 payload did not decode.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedContainer(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
