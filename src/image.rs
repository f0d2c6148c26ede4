//! Image records and pixel buffers passed across the API

use imgref::ImgVec;
use rgb::{Rgb, Rgba};

/// Header-level facts about an AVIF file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Bit depth of the coded image (8, 10 or 12)
    pub bit_depth: u8,
    /// Whether the image carries an alpha channel
    pub has_alpha: bool,
    /// Number of frames (1 for still images)
    pub frame_count: u32,
    /// Total animation duration in seconds, 0 for still images
    pub duration: f64,
    /// Whether an ICC profile is embedded
    pub has_icc_profile: bool,
    /// Whether EXIF metadata is embedded
    pub has_exif: bool,
}

/// One decoded frame, packed for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    /// Row-major ARGB pixels, alpha in the high byte
    pub pixels: Vec<u32>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether the source had alpha (otherwise every alpha byte is 255)
    pub has_alpha: bool,
    /// Bit depth of the coded image, not of `pixels`
    pub bit_depth: u8,
    /// Embedded ICC profile, if any
    pub icc_profile: Option<Vec<u8>>,
}

/// Tightly packed 8-bit interleaved pixels produced by decoding
#[derive(Debug, Clone)]
pub enum RgbPixels {
    /// 8-bit RGB
    Rgb8(ImgVec<Rgb<u8>>),
    /// 8-bit RGBA
    Rgba8(ImgVec<Rgba<u8>>),
}

impl RgbPixels {
    /// Width in pixels
    pub fn width(&self) -> usize {
        match self {
            RgbPixels::Rgb8(img) => img.width(),
            RgbPixels::Rgba8(img) => img.width(),
        }
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        match self {
            RgbPixels::Rgb8(img) => img.height(),
            RgbPixels::Rgba8(img) => img.height(),
        }
    }

    /// Returns true for the RGBA variant
    pub fn has_alpha(&self) -> bool {
        matches!(self, RgbPixels::Rgba8(_))
    }
}

/// Caller-owned interleaved RGB(A) bytes with an explicit stride
#[derive(Debug, Clone, Copy)]
pub struct RgbInput<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) stride: usize,
    pub(crate) has_alpha: bool,
}

impl<'a> RgbInput<'a> {
    /// Describe `data` as `height` rows of `stride` bytes
    ///
    /// No validation happens here; the encoder checks dimensions, stride
    /// and length before converting.
    pub fn new(data: &'a [u8], width: usize, height: usize, stride: usize, has_alpha: bool) -> Self {
        Self {
            data,
            width,
            height,
            stride,
            has_alpha,
        }
    }

    /// 3 or 4
    pub fn bytes_per_pixel(&self) -> usize {
        if self.has_alpha { 4 } else { 3 }
    }

    /// Bytes of pixel data in one row, excluding padding; `None` on overflow
    pub fn row_bytes(&self) -> Option<usize> {
        self.width.checked_mul(self.bytes_per_pixel())
    }
}

/// Matrix used to derive the coded planes from RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMatrix {
    /// BT.601 YCbCr
    Bt601,
    /// Identity: planes carry G, B, R unchanged
    Identity,
}

/// A 4:4:4 full-range image in coded form, ready for the AV1 encoder
#[derive(Debug, Clone)]
pub struct YuvImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) depth: u8,
    pub(crate) matrix: EncodeMatrix,
    /// Per pixel `[Y, Cb, Cr]`, or `[G, B, R]` for [`EncodeMatrix::Identity`]
    pub(crate) pixels: Vec<[u16; 3]>,
    pub(crate) alpha: Option<Vec<u16>>,
}

impl YuvImage {
    /// Allocate an empty image of the given geometry
    pub fn new(width: usize, height: usize, depth: u8, matrix: EncodeMatrix) -> Self {
        Self {
            width,
            height,
            depth,
            matrix,
            pixels: Vec::new(),
            alpha: None,
        }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample bit depth
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Coded planes, one triple per pixel
    pub fn pixels(&self) -> &[[u16; 3]] {
        &self.pixels
    }

    /// Alpha plane, if the source had one
    pub fn alpha(&self) -> Option<&[u16]> {
        self.alpha.as_deref()
    }
}
