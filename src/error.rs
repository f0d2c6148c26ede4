//! Error types for zenavif-io

/// Coarse classification surfaced to callers at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Out-of-domain argument; caller state is unchanged
    InvalidArgument,
    /// Anything that went wrong reading, parsing, decoding, converting or encoding
    Io,
}

/// Error type for zenavif-io operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration value outside its domain
    #[error("{0}")]
    InvalidConfig(String),

    /// Offset/length do not describe a range inside the input buffer
    #[error("Invalid offset/length: offset {offset}, length {length}, buffer size {size}")]
    InvalidRange {
        /// Requested start
        offset: usize,
        /// Requested length
        length: usize,
        /// Size of the buffer the range was taken from
        size: usize,
    },

    /// Zero width or height
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Row stride cannot hold one row of pixels
    #[error("Stride {stride} is smaller than a row of {row_bytes} bytes")]
    StrideTooSmall {
        /// Caller stride in bytes
        stride: usize,
        /// Minimum bytes per row
        row_bytes: usize,
    },

    /// Packed pixel slice does not match the declared dimensions
    #[error("Expected {expected} pixels, got {actual}")]
    PixelCountMismatch {
        /// width * height
        expected: usize,
        /// Slice length
        actual: usize,
    },

    /// Pixel buffer shorter than height * stride
    #[error("Pixel buffer too short: need {needed} bytes, got {actual}")]
    BufferTooShort {
        /// Bytes required
        needed: usize,
        /// Bytes provided
        actual: usize,
    },

    /// AVIF container parsing error
    #[error("AVIF parse error: {0}")]
    Parse(#[from] zenavif_parse::Error),

    /// Malformed item metadata (iloc/iinf/ipma/colr/Exif)
    #[error("Invalid item metadata: {0}")]
    Metadata(&'static str),

    /// AV1 decode error from rav1d
    #[error("AV1 decode error: {0}")]
    Decode(String),

    /// Requested frame does not exist
    #[error("Frame index {index} out of range (frame count {count})")]
    FrameOutOfRange {
        /// Requested index
        index: usize,
        /// Frames in the file
        count: usize,
    },

    /// YUV to RGB color conversion error
    #[error("Color conversion error: {0}")]
    ColorConversion(#[from] yuv::YuvError),

    /// AV1 encode error from ravif
    #[error("AVIF encode error: {0}")]
    Encode(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Classify this error for the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidRange { .. }
            | Error::InvalidDimensions { .. }
            | Error::StrideTooSmall { .. }
            | Error::PixelCountMismatch { .. } => ErrorKind::InvalidArgument,
            Error::BufferTooShort { .. }
            | Error::Parse(_)
            | Error::Metadata(_)
            | Error::Decode(_)
            | Error::FrameOutOfRange { .. }
            | Error::ColorConversion(_)
            | Error::Encode(_)
            | Error::Unsupported(_) => ErrorKind::Io,
        }
    }
}

/// Result type for zenavif-io operations with location tracking
pub type Result<T, E = whereat::At<Error>> = core::result::Result<T, E>;
