use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeshakeError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transforms data mismatch: {0}")]
    SerializationMismatch(String),

    #[error("incompatible source/destination geometry: {0}")]
    IncompatibleGeometry(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, DeshakeError>;
