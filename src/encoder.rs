//! AVIF encoding via ravif
//!
//! Input is caller-owned interleaved RGB(A) bytes with an explicit stride.
//! Pixels are converted to 4:4:4 planes ([`crate::rgb_to_yuv`]) and handed
//! to ravif's raw-plane entry points, so the matrix and range written to the
//! file are exactly the ones used for conversion.

use crate::Result;
use crate::config::EncoderConfig;
use crate::convert::{rgb_to_yuv, unpack_argb};
use crate::error::Error;
use crate::image::{EncodeMatrix, RgbInput, YuvImage};
use whereat::at;

/// Highest sample depth the AV1 encoder produces
const MAX_CODED_DEPTH: u8 = 10;

/// Build a ravif Encoder from our config
fn build_ravif_encoder(config: &EncoderConfig, depth: u8) -> ravif::Encoder<'static> {
    // ravif quality is 1..=100 and speed 1..=10; 100 is lossless
    let quality = if config.lossless {
        100.0
    } else {
        f32::from(config.quality).max(1.0)
    };
    ravif::Encoder::new()
        .with_quality(quality)
        .with_alpha_quality(quality)
        .with_speed(config.speed.clamp(1, 10))
        .with_bit_depth(if depth > 8 {
            ravif::BitDepth::Ten
        } else {
            ravif::BitDepth::Eight
        })
        .with_num_threads(Some(1))
}

/// Encode interleaved 8-bit pixels to an AVIF file
///
/// # Arguments
///
/// * `config` - Encoder settings; `None` uses [`EncoderConfig::DEFAULT`]
/// * `pixels` - `height` rows of `stride` bytes, RGB or RGBA per `has_alpha`
/// * `stride` - Bytes from the start of one row to the next
pub fn encode(
    config: Option<&EncoderConfig>,
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    has_alpha: bool,
) -> Result<Vec<u8>> {
    let config = config.copied().unwrap_or_default();
    if width == 0 || height == 0 {
        return Err(at(Error::InvalidDimensions { width, height }));
    }
    let input = RgbInput::new(pixels, width as usize, height as usize, stride, has_alpha);
    let row_bytes = input.row_bytes().unwrap_or(usize::MAX);
    if stride < row_bytes {
        return Err(at(Error::StrideTooSmall { stride, row_bytes }));
    }
    // a product past usize::MAX can never be satisfied by a real buffer
    let needed = input.height.checked_mul(stride).unwrap_or(usize::MAX);
    if pixels.len() < needed {
        return Err(at(Error::BufferTooShort {
            needed,
            actual: pixels.len(),
        }));
    }

    let depth = if config.bit_depth > MAX_CODED_DEPTH {
        log::warn!(
            "{}-bit output is not available; encoding at {MAX_CODED_DEPTH} bits",
            config.bit_depth
        );
        MAX_CODED_DEPTH
    } else {
        config.bit_depth
    };
    let (matrix, coded_matrix) = if config.lossless {
        (EncodeMatrix::Identity, ravif::MatrixCoefficients::Identity)
    } else {
        (EncodeMatrix::Bt601, ravif::MatrixCoefficients::BT601)
    };

    let mut image = YuvImage::new(input.width, input.height, depth, matrix);
    rgb_to_yuv(&input, &mut image)?;

    let enc = build_ravif_encoder(&config, depth);
    let encoded = if depth > 8 {
        enc.encode_raw_planes_10_bit(
            image.width,
            image.height,
            image.pixels.iter().copied(),
            image.alpha.as_ref().map(|a| a.iter().copied()),
            ravif::PixelRange::Full,
            coded_matrix,
        )
    } else {
        enc.encode_raw_planes_8_bit(
            image.width,
            image.height,
            image
                .pixels
                .iter()
                .map(|p| [p[0] as u8, p[1] as u8, p[2] as u8]),
            image.alpha.as_ref().map(|a| a.iter().map(|&v| v as u8)),
            ravif::PixelRange::Full,
            coded_matrix,
        )
    }
    .map_err(|e| at(Error::Encode(e.to_string())))?;

    log::debug!(
        "encoded {width}x{height} {depth}-bit lossless={} into {} bytes (color {}, alpha {})",
        config.lossless,
        encoded.avif_file.len(),
        encoded.color_byte_size,
        encoded.alpha_byte_size
    );
    Ok(encoded.avif_file)
}

/// Encode packed ARGB pixels, dropping alpha when every pixel is opaque
pub fn encode_argb(
    config: Option<&EncoderConfig>,
    pixels: &[u32],
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(at(Error::InvalidDimensions { width, height }));
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .unwrap_or(usize::MAX);
    if pixels.len() != expected {
        return Err(at(Error::PixelCountMismatch {
            expected,
            actual: pixels.len(),
        }));
    }
    let opaque = pixels.iter().all(|&p| p >> 24 == 0xff);
    let has_alpha = !opaque;
    let bytes = unpack_argb(pixels, has_alpha);
    let stride = width as usize * if has_alpha { 4 } else { 3 };
    encode(config, &bytes, width, height, stride, has_alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind(result: Result<Vec<u8>>) -> ErrorKind {
        match result {
            Ok(_) => panic!("expected an error"),
            Err(e) => e.into_inner().kind(),
        }
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        assert_eq!(kind(encode(None, &[], 0, 4, 0, false)), ErrorKind::InvalidArgument);
        assert_eq!(kind(encode(None, &[], 4, 0, 12, false)), ErrorKind::InvalidArgument);
    }

    #[test]
    fn stride_below_row_is_invalid() {
        let pixels = [0u8; 64];
        assert_eq!(kind(encode(None, &pixels, 4, 4, 15, true)), ErrorKind::InvalidArgument);
    }

    #[test]
    fn short_buffer_is_io() {
        let pixels = [0u8; 4 * 3 * 4 - 1];
        assert_eq!(kind(encode(None, &pixels, 4, 4, 12, false)), ErrorKind::Io);
    }

    #[test]
    fn huge_stride_is_a_short_buffer() {
        let stride = usize::MAX / 2 + 1;
        assert_eq!(kind(encode(None, &[0; 3], 1, 2, stride, false)), ErrorKind::Io);
        assert_eq!(kind(encode(None, &[0; 4], 1, 3, stride, true)), ErrorKind::Io);
        assert_eq!(kind(encode(None, &[0; 3], 1, 1, usize::MAX, false)), ErrorKind::Io);
    }

    #[test]
    fn argb_count_must_match() {
        assert_eq!(
            kind(encode_argb(None, &[0xff00_0000; 3], 2, 2)),
            ErrorKind::InvalidArgument
        );
    }
}
