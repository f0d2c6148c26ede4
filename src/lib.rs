//! # zenavif-io
//!
//! AVIF codec bridge built on [rav1d-safe](https://github.com/imazen/rav1d-safe),
//! zenavif-parse and ravif.
//!
//! The API is a flat set of calls over caller-owned byte buffers: inspect a
//! file's headers, decode a frame to packed ARGB words, encode interleaved
//! RGB(A) bytes, and pull the embedded ICC profile or Exif block. Every call
//! parses what it needs, does its work on the calling thread, and releases
//! everything before returning.
//!
//! ## Quick Start
//!
//! ```no_run
//! use zenavif_io::{EncoderConfig, decode, encode_rgb, inspect};
//!
//! let rgb = vec![128u8; 16 * 16 * 3];
//! let config = EncoderConfig::new().with_quality(80).unwrap();
//! let avif = encode_rgb(Some(&config), &rgb, 16, 16, 16 * 3).unwrap();
//!
//! let info = inspect(&avif, 0, avif.len()).unwrap();
//! assert_eq!((info.width, info.height), (16, 16));
//!
//! let decoded = decode(None, &avif, 0, avif.len()).unwrap();
//! let argb: &[u32] = &decoded.pixels;
//! # let _ = argb;
//! ```
//!
//! ## Configuration
//!
//! Encoder and decoder settings are plain records passed as `Option<&T>`;
//! `None` behaves like a null handle and uses the defaults. [`Handle`]
//! wraps a record in an owned, nullable handle for callers that manage
//! settings objects explicitly.
//!
//! ## Errors
//!
//! Every failure is an [`Error`] wrapped in [`whereat::At`] with the
//! location it was raised. [`Error::kind`] sorts them into
//! [`ErrorKind::InvalidArgument`] and [`ErrorKind::Io`].

mod boxes;
mod config;
mod container;
mod convert;
mod decoder;
mod encoder;
mod error;
mod handle;
mod image;
mod reader;

pub use config::{DecoderOptions, EncoderConfig};
pub use convert::{pack_argb, rgb_to_yuv, unpack_argb};
pub use encoder::{encode, encode_argb};
pub use error::{Error, ErrorKind, Result};
pub use handle::{DecoderOptionsHandle, EncoderConfigHandle, Handle};
pub use image::{DecodeResult, EncodeMatrix, ImageInfo, RgbInput, RgbPixels, YuvImage};
pub use reader::{ImageMetadata, Reader};

use decoder::DecoderSession;

/// Read header information without decoding pixels
///
/// `offset` and `length` select the AVIF file inside `bytes`.
pub fn inspect(bytes: &[u8], offset: usize, length: usize) -> Result<ImageInfo> {
    Ok(DecoderSession::open(bytes, offset, length)?.info())
}

/// Decode the first frame
///
/// Same as [`decode_frame`] with a negative index.
pub fn decode(
    options: Option<&DecoderOptions>,
    bytes: &[u8],
    offset: usize,
    length: usize,
) -> Result<DecodeResult> {
    decode_frame(options, bytes, offset, length, -1)
}

/// Decode one frame to packed ARGB
///
/// A negative `frame_index` decodes the first frame; otherwise the 0-based
/// frame is decoded and an index past the last frame is an error. The
/// options are accepted but do not currently change what is returned:
/// the ICC profile is always included when present.
pub fn decode_frame(
    options: Option<&DecoderOptions>,
    bytes: &[u8],
    offset: usize,
    length: usize,
    frame_index: i32,
) -> Result<DecodeResult> {
    let options = options.copied().unwrap_or_default();
    log::trace!(
        "decode options: ignore_icc={} ignore_exif={} (not applied)",
        options.ignore_icc,
        options.ignore_exif
    );

    let session = DecoderSession::open(bytes, offset, length)?;
    let index = usize::try_from(frame_index).ok();
    let pixels = session.render(index)?;
    let container = session.container();
    Ok(DecodeResult {
        pixels: pack_argb(&pixels),
        width: pixels.width() as u32,
        height: pixels.height() as u32,
        has_alpha: container.has_alpha,
        bit_depth: container.bit_depth,
        icc_profile: container.icc().map(<[u8]>::to_vec),
    })
}

/// Encode tightly or loosely packed RGB bytes
pub fn encode_rgb(
    config: Option<&EncoderConfig>,
    rgb: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>> {
    encode(config, rgb, width, height, stride, false)
}

/// Encode RGBA bytes
pub fn encode_rgba(
    config: Option<&EncoderConfig>,
    rgba: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>> {
    encode(config, rgba, width, height, stride, true)
}

/// Exif bytes of the file, `None` if it has none
pub fn get_exif(bytes: &[u8], offset: usize, length: usize) -> Result<Option<Vec<u8>>> {
    let session = DecoderSession::open(bytes, offset, length)?;
    Ok(session.container().exif().map(<[u8]>::to_vec))
}

/// ICC profile of the file, `None` if it has none
pub fn get_icc_profile(bytes: &[u8], offset: usize, length: usize) -> Result<Option<Vec<u8>>> {
    let session = DecoderSession::open(bytes, offset, length)?;
    Ok(session.container().icc().map(<[u8]>::to_vec))
}
