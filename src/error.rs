use std::io;

use crate::axes::Axis;
use crate::codecs::bb::gzip_codec::InvalidGzipLevel;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid axis order `{order}`: {reason}")]
    InvalidAxisOrder { order: String, reason: String },
    #[error("Axis order `{order}` is missing required axis {axis}")]
    MissingRequiredAxis { order: String, axis: Axis },
    #[error("Buffer has {actual} elements, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Unsupported element type `{0}`")]
    UnsupportedElementType(String),
    #[error("Invalid compression level {0} (must be 0-9)")]
    InvalidCompressionLevel(u32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn invalid_axis_order(order: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAxisOrder {
            order: order.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}

impl From<InvalidGzipLevel> for Error {
    fn from(value: InvalidGzipLevel) -> Self {
        Self::InvalidCompressionLevel(value.level())
    }
}
